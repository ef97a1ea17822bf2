//! `nsqlookupd` discovery: which `nsqd` nodes carry a topic.
use std::time::Duration;

use coin_common::{CoinError, Result};
use log::{debug, info};
use serde::Deserialize;

/// Per-request timeout for lookup queries.
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    producers: Vec<Producer>,
}

/// One `nsqd` node reported by lookupd.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Producer {
    /// Address the node advertises to clients.
    pub broadcast_address: String,
    /// Its TCP protocol port.
    pub tcp_port: u16,
}

impl Producer {
    /// `host:port` to dial for the TCP protocol.
    pub fn tcp_addr(&self) -> String {
        format!("{}:{}", self.broadcast_address, self.tcp_port)
    }
}

/// Ask the lookupd HTTP endpoint at `addr` for the producers of `topic`.
///
/// An empty producer list is an error, since there is nothing to subscribe to.
pub fn lookup_producers(addr: &str, topic: &str) -> Result<Vec<Producer>> {
    let base = if addr.contains("://") {
        addr.to_string()
    } else {
        format!("http://{addr}")
    };
    let client = reqwest::blocking::Client::builder()
        .timeout(LOOKUP_TIMEOUT)
        .build()
        .map_err(|e| CoinError::Network(e.to_string()))?;

    debug!("Looking up producers of '{}' at {}", topic, base);
    let response = client
        .get(format!("{}/lookup", base.trim_end_matches('/')))
        .query(&[("topic", topic)])
        .send()
        .map_err(|e| CoinError::Network(e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(CoinError::HttpStatus {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
        });
    }
    let body: LookupResponse = response
        .json()
        .map_err(|e| CoinError::Format(e.to_string()))?;

    if body.producers.is_empty() {
        return Err(CoinError::Bus(format!("no producers for topic '{topic}'")));
    }
    info!(
        "Lookupd {} reports {} producer(s) for '{}'",
        base,
        body.producers.len(),
        topic
    );
    Ok(body.producers)
}
