//! HTTP/1.1 response handling: head parsing with `httparse` and body framing.
use std::io::{BufRead, Read};

use chunked_transfer::Decoder;
use coin_common::{CoinError, Result};
use httparse::Status;

const MAX_HEADERS: usize = 64;
const MAX_HEAD_BYTES: usize = 64 * 1024;

/// Status line and headers of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    /// Numeric status code.
    pub status: u16,
    /// Reason phrase.
    pub reason: String,
    headers: Vec<(String, String)>,
}

impl ResponseHead {
    /// First value of header `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// `true` for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn is_chunked(&self) -> bool {
        self.header("transfer-encoding")
            .is_some_and(|v| v.to_ascii_lowercase().contains("chunked"))
    }

    fn content_length(&self) -> Option<u64> {
        self.header("content-length").and_then(|v| v.trim().parse().ok())
    }
}

/// Read the status line and headers, leaving `reader` at the start of the body.
pub fn read_head<R: BufRead>(reader: &mut R) -> Result<ResponseHead> {
    let mut raw = Vec::new();
    loop {
        if reader.read_until(b'\n', &mut raw)? == 0 {
            return Err(CoinError::Network(if raw.is_empty() {
                "connection closed before response".into()
            } else {
                "connection closed inside response head".into()
            }));
        }
        if raw.len() > MAX_HEAD_BYTES {
            return Err(CoinError::Format("response head too large".into()));
        }

        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut response = httparse::Response::new(&mut headers);
        match response.parse(&raw) {
            Ok(Status::Complete(_)) => {
                return Ok(ResponseHead {
                    status: response.code.unwrap_or_default(),
                    reason: response.reason.unwrap_or_default().to_string(),
                    headers: response
                        .headers
                        .iter()
                        .map(|h| {
                            (
                                h.name.to_string(),
                                String::from_utf8_lossy(h.value).trim().to_string(),
                            )
                        })
                        .collect(),
                });
            }
            Ok(Status::Partial) => continue,
            Err(e) => return Err(CoinError::Format(format!("bad response head: {}", e))),
        }
    }
}

/// Wrap the remaining stream in a reader that yields exactly the response body.
pub fn body_reader<R>(head: &ResponseHead, reader: R) -> Box<dyn Read + Send>
where
    R: BufRead + Send + 'static,
{
    if head.is_chunked() {
        Box::new(Decoder::new(reader))
    } else if let Some(len) = head.content_length() {
        Box::new(reader.take(len))
    } else {
        Box::new(reader)
    }
}
