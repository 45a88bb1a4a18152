//! UQRP response parsing.
//!
//! Responses travel as semicolon-delimited `key=value` strings inside TXT
//! records. Reserved keys populate the named [`Response`] fields; everything
//! else belongs to an implicit JSON data object, with compact field aliases
//! expanded to their canonical names.
//!
//! Two formats are supported:
//!
//! 1. Explicit data: `v=rdb1;s=ok;t=json;e=base64;d=<payload>`
//! 2. Compact fields: `v=rdb1;s=ok;loc=Quebec;tc=-7.2;cnd=sunny;ttl=300`

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::encoding::{decode_base64, decode_hex};
use crate::error::{Error, ErrorCode, Result};
use crate::security::verify_chunk_integrity;

/// A parsed ResolveDB response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Response {
    /// Protocol version (e.g. "rdb1"). Required.
    pub version: String,
    /// Status code (e.g. "ok", "notfound", "E004").
    pub status: String,
    /// Response type (e.g. "json", "text", "binary").
    pub content_type: String,
    /// Data encoding on the wire (e.g. "base64", "hex", "plain").
    pub encoding: String,
    /// Data format after decoding (e.g. "json", "text").
    pub format: String,
    /// Cache TTL.
    pub ttl: Duration,
    /// Decoded response data, absent when the server sent none.
    pub data: Option<Vec<u8>>,
    /// Error details when the status is not a success.
    pub error: String,
    /// Number of chunks for large data (0 or 1 means unchunked).
    pub chunks: u32,
    /// Index of this chunk within a chunked set.
    pub chunk: u32,
    /// Hex-encoded SHA-256 of this record's data, for chunk verification.
    pub hash: String,
}

impl Response {
    /// Parse a single UQRP response string.
    pub fn parse(s: &str) -> Result<Response> {
        let mut resp = Response::default();
        let mut data_fields = Map::new();

        for part in s.split(';') {
            let Some((key, value)) = part.split_once('=') else {
                continue;
            };

            match key {
                "v" => resp.version = value.to_string(),
                "s" => resp.status = value.to_string(),
                "t" => resp.content_type = value.to_string(),
                "e" => resp.encoding = value.to_string(),
                "f" => resp.format = value.to_string(),
                "ttl" => {
                    if let Ok(secs) = value.parse::<u64>() {
                        resp.ttl = Duration::from_secs(secs);
                    }
                }
                "d" => {
                    resp.data = Some(decode_data(value, &resp.encoding)?);
                }
                "err" => resp.error = value.to_string(),
                "chunks" => {
                    if let Ok(n) = value.parse::<u32>() {
                        resp.chunks = n;
                    }
                }
                "chunk" => {
                    if let Ok(n) = value.parse::<u32>() {
                        resp.chunk = n;
                    }
                }
                "hash" => resp.hash = value.to_string(),
                "ts" => {
                    // Reserved; not stored.
                }
                _ => {
                    data_fields.insert(expand_alias(key).to_string(), parse_value(value));
                }
            }
        }

        if resp.version.is_empty() {
            return Err(Error::InvalidResponse);
        }

        // Compact format: synthesize a JSON object from the loose fields.
        if resp.data.is_none() && !data_fields.is_empty() {
            resp.data = Some(serde_json::to_vec(&Value::Object(data_fields))?);
        }

        Ok(resp)
    }

    /// Parse the text records of one DNS answer into a single response.
    ///
    /// A record set is either one record, a long response split across
    /// records (concatenated before parsing), or a chunked blob whose
    /// pieces are reassembled in `chunk` order after per-piece hash
    /// verification.
    pub fn parse_records(records: &[Vec<u8>]) -> Result<Response> {
        match records {
            [] => Err(Error::InvalidResponse),
            [record] => Response::parse(record_str(record)?),
            _ => {
                if let Ok(first) = Response::parse(record_str(&records[0])?) {
                    if first.is_chunked() {
                        return reassemble_chunks(records);
                    }
                }
                // Plain continuation: the record set carries one logical
                // string split by TXT size limits.
                let mut combined = Vec::new();
                for record in records {
                    combined.extend_from_slice(record);
                }
                Response::parse(record_str(&combined)?)
            }
        }
    }

    /// True if the response indicates success.
    pub fn is_success(&self) -> bool {
        self.status == "ok" || self.status == "success"
    }

    /// True if the response indicates an error.
    pub fn is_error(&self) -> bool {
        self.status == "error" || self.status.starts_with("E0")
    }

    /// True if the response is one piece of a chunked data set.
    pub fn is_chunked(&self) -> bool {
        self.chunks > 1
    }

    /// The raw data as a (lossy) string.
    pub fn as_text(&self) -> String {
        match &self.data {
            Some(data) => String::from_utf8_lossy(data).into_owned(),
            None => String::new(),
        }
    }

    /// Convert a failure status into its error, if any.
    pub fn to_error(&self) -> Result<()> {
        if self.is_success() {
            return Ok(());
        }

        if self.status.starts_with("E0") {
            return match Error::from_wire_code(&self.status, self.error.clone()) {
                Some(err) => Err(err),
                None => Ok(()),
            };
        }

        match self.status.as_str() {
            "notfound" => Err(Error::protocol(ErrorCode::NotFound, self.error.clone())),
            "unauthorized" => Err(Error::protocol(ErrorCode::Unauthorized, self.error.clone())),
            "forbidden" => Err(Error::protocol(ErrorCode::Forbidden, self.error.clone())),
            "ratelimit" | "ratelimited" => {
                Err(Error::protocol(ErrorCode::RateLimited, self.error.clone()))
            }
            "timeout" => Err(Error::protocol(ErrorCode::Timeout, self.error.clone())),
            "error" => {
                // The err field may carry the real code: "E007 bad payload".
                if self.error.len() >= 4 && self.error.starts_with("E0") {
                    let code = &self.error[..4];
                    let details = if self.error.len() > 5 {
                        &self.error[5..]
                    } else {
                        ""
                    };
                    if let Some(err) = Error::from_wire_code(code, details) {
                        return Err(err);
                    }
                    return Ok(());
                }
                Err(Error::protocol(ErrorCode::ServerError, self.error.clone()))
            }
            _ => Err(Error::Protocol {
                code: ErrorCode::ServerError,
                message: self.status.clone(),
                details: self.error.clone(),
            }),
        }
    }

    /// Decode the response data into the caller's type.
    ///
    /// JSON by default; `text` format decodes into a string. Missing data
    /// yields the status error, or not-found when the status was a success.
    pub fn unmarshal<T: DeserializeOwned>(&self) -> Result<T> {
        let Some(data) = &self.data else {
            self.to_error()?;
            return Err(Error::protocol(ErrorCode::NotFound, ""));
        };

        match self.format.as_str() {
            "json" | "" => Ok(serde_json::from_slice(data)?),
            "text" => {
                let s = String::from_utf8(data.clone())
                    .map_err(|e| Error::Encoding(format!("invalid utf-8 in text data: {e}")))?;
                Ok(serde_json::from_value(Value::String(s))?)
            }
            other => {
                // Unknown format: JSON is the best guess.
                if let Ok(v) = serde_json::from_slice(data) {
                    return Ok(v);
                }
                Err(Error::Encoding(format!("unsupported format: {other}")))
            }
        }
    }
}

fn record_str(record: &[u8]) -> Result<&str> {
    std::str::from_utf8(record).map_err(|_| Error::InvalidResponse)
}

/// Decode the `d` field per the declared encoding.
fn decode_data(data: &str, encoding: &str) -> Result<Vec<u8>> {
    match encoding {
        "base64" | "b64" => decode_base64(data),
        "hex" => decode_hex(data),
        "plain" | "text" | "" => Ok(data.as_bytes().to_vec()),
        _ => {
            // Unknown encodings: base64 is the best guess, else raw bytes.
            match decode_base64(data) {
                Ok(decoded) => Ok(decoded),
                Err(_) => Ok(data.as_bytes().to_vec()),
            }
        }
    }
}

/// Reassemble a chunked record set: parse every record, order by chunk
/// index, verify each piece's hash, concatenate.
fn reassemble_chunks(records: &[Vec<u8>]) -> Result<Response> {
    let mut pieces = Vec::with_capacity(records.len());
    for record in records {
        pieces.push(Response::parse(record_str(record)?));
    }
    let mut pieces: Vec<Response> = pieces.into_iter().collect::<Result<_>>()?;
    pieces.sort_by_key(|p| p.chunk);

    let expected = pieces[0].chunks;
    if pieces.len() != expected as usize {
        return Err(Error::InvalidResponse);
    }

    let mut blob = Vec::new();
    for (i, piece) in pieces.iter().enumerate() {
        if piece.chunk != i as u32 || piece.chunks != expected {
            return Err(Error::InvalidResponse);
        }
        let data = piece.data.as_deref().unwrap_or_default();
        verify_chunk_integrity(data, &piece.hash)?;
        blob.extend_from_slice(data);
    }

    let mut resp = pieces.swap_remove(0);
    resp.data = Some(blob);
    resp.chunk = 0;
    Ok(resp)
}

/// Promote a string value to a number or boolean where parseable.
fn parse_value(s: &str) -> Value {
    if let Ok(i) = s.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return Value::from(f);
    }
    match s {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(s.to_string()),
    }
}

/// Expand compact UQRP field names to their canonical JSON names.
fn expand_alias(key: &str) -> &str {
    match key {
        // Weather fields
        "loc" => "location",
        "tc" => "temp_c",
        "tf" => "temp_f",
        "cnd" => "conditions",
        "hum" => "humidity",
        "wnd" => "wind_kph",
        "vis" => "visibility_km",
        "uv" => "uv_index",
        "tz" => "timezone",
        "lt" => "local_time",
        // GeoIP fields
        "cc" => "country_code",
        "cn" => "country",
        "rg" => "region",
        "ct" => "city",
        "lat" => "latitude",
        "lon" => "longitude",
        "org" => "organization",
        "as" => "asn",
        // ip, isp, mobile, proxy, hosting pass through unchanged
        other => other,
    }
}
