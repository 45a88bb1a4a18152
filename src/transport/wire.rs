//! DNS wire format: query construction and response parsing.
//!
//! Queries are standard RFC 1035 messages with a cryptographically random
//! transaction ID. Response parsing is defensive: every offset is bounds
//! checked, name compression pointers are never followed (only skipped),
//! and TXT character-string fragments are concatenated per record.

use crate::error::{Error, Result};
use crate::transport::{Response, TYPE_TXT};

/// DNS header length in bytes.
const HEADER_LEN: usize = 12;

/// Build a DNS query message for the given name and type.
pub fn build_query(name: &str, qtype: u16) -> Vec<u8> {
    let mut msg = Vec::with_capacity(HEADER_LEN + name.len() + 6);

    // Transaction ID: random to prevent off-path response forgery.
    let txid: u16 = rand::random();
    msg.extend_from_slice(&txid.to_be_bytes());

    // Flags: standard query, recursion desired.
    msg.extend_from_slice(&[0x01, 0x00]);

    // QDCOUNT=1; answer, authority, additional all zero.
    msg.extend_from_slice(&[0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);

    // Question section: name as length-prefixed labels.
    for label in name.split('.') {
        if label.is_empty() {
            continue;
        }
        msg.push(label.len() as u8);
        msg.extend_from_slice(label.as_bytes());
    }
    msg.push(0x00);

    msg.extend_from_slice(&qtype.to_be_bytes());
    // Class IN.
    msg.extend_from_slice(&[0x00, 0x01]);

    msg
}

/// Parse a DNS response message, extracting text records and the smallest
/// non-zero TTL.
pub fn parse_response(data: &[u8]) -> Result<Response> {
    if data.len() < HEADER_LEN {
        return Err(Error::Transport("response too short".into()));
    }

    let qdcount = u16::from_be_bytes([data[4], data[5]]) as usize;
    let ancount = u16::from_be_bytes([data[6], data[7]]) as usize;

    let mut offset = HEADER_LEN;

    // Skip the question section.
    for _ in 0..qdcount {
        offset = skip_name(data, offset)?;
        offset = checked_add(offset, 4, data.len())?; // QTYPE + QCLASS
    }

    let mut resp = Response::default();

    for _ in 0..ancount {
        if offset >= data.len() {
            break;
        }
        offset = skip_name(data, offset)?;
        if offset + 10 > data.len() {
            break;
        }

        let rtype = u16::from_be_bytes([data[offset], data[offset + 1]]);
        // Skip TYPE + CLASS.
        offset += 4;

        let ttl = u32::from_be_bytes([
            data[offset],
            data[offset + 1],
            data[offset + 2],
            data[offset + 3],
        ]);
        offset += 4;

        let rdlen = u16::from_be_bytes([data[offset], data[offset + 1]]) as usize;
        offset += 2;

        if offset + rdlen > data.len() {
            break;
        }
        let rdata = &data[offset..offset + rdlen];
        offset += rdlen;

        let record = if rtype == TYPE_TXT {
            strip_txt_strings(rdata)
        } else {
            rdata.to_vec()
        };
        resp.records.push(record);

        if ttl > 0 && (resp.ttl == 0 || ttl < resp.ttl) {
            resp.ttl = ttl;
        }
    }

    for record in &resp.records {
        resp.data.extend_from_slice(record);
    }

    Ok(resp)
}

/// Skip over an encoded name starting at `offset`, returning the offset of
/// the byte after it. A compression pointer (top two bits set) ends the
/// name in two bytes.
fn skip_name(data: &[u8], mut offset: usize) -> Result<usize> {
    loop {
        let len = *data
            .get(offset)
            .ok_or_else(|| Error::Transport("truncated name".into()))? as usize;
        if len == 0 {
            return Ok(offset + 1);
        }
        if len >= 0xC0 {
            return checked_add(offset, 2, data.len());
        }
        offset = checked_add(offset, 1 + len, data.len())?;
    }
}

fn checked_add(offset: usize, add: usize, len: usize) -> Result<usize> {
    let next = offset + add;
    if next > len {
        return Err(Error::Transport("truncated message".into()));
    }
    Ok(next)
}

/// Concatenate the character-strings of a TXT record, dropping each leading
/// length octet.
fn strip_txt_strings(rdata: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(rdata.len());
    let mut pos = 0;
    while pos < rdata.len() {
        let len = rdata[pos] as usize;
        pos += 1;
        if pos + len <= rdata.len() {
            out.extend_from_slice(&rdata[pos..pos + len]);
        }
        pos += len;
    }
    out
}
