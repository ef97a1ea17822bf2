//! Instrument snapshot data model and bus message codec.
//!
//! An `InstrumentSnapshot` is one instrument's market data at a point in time, in the
//! field shape the market data provider returns from its `/coins/markets` endpoint.
//! Provider fields that may be JSON `null` are `Option`s; `id`, `symbol` and `name`
//! are required.
//!
//! On the bus a snapshot travels as an `EncodedMessage`: the `bincode` encoding of
//! exactly one snapshot. Decoding rejects truncated payloads, trailing bytes and
//! payloads larger than [`MAX_MESSAGE_BYTES`].

use bincode::{Decode, Encode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoinError;
use crate::result::Result;

/// Upper bound on the size of a decoded message.
pub const MAX_MESSAGE_BYTES: usize = 1 << 20;

/// Return-on-investment sub-record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct Roi {
    /// Multiple of the initial price.
    #[serde(default)]
    pub times: f64,
    /// Currency the return is expressed in.
    #[serde(default)]
    pub currency: String,
    /// Return in percent.
    #[serde(default)]
    pub percentage: f64,
}

/// Seven-day price series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct Sparkline {
    /// Hourly prices, oldest first.
    #[serde(default)]
    pub price: Vec<f64>,
}

/// Market data for a single instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct InstrumentSnapshot {
    /// Provider instrument id (e.g., `bitcoin`).
    pub id: String,
    /// Ticker symbol (e.g., `btc`).
    pub symbol: String,
    /// Display name.
    pub name: String,
    /// Logo URL.
    pub image: Option<String>,
    /// Last price in the target currency.
    pub current_price: Option<f64>,
    /// Market capitalisation.
    pub market_cap: Option<f64>,
    /// Rank by market capitalisation.
    pub market_cap_rank: Option<u32>,
    /// Traded volume over 24h.
    pub total_volume: Option<f64>,
    /// 24h high.
    pub high_24h: Option<f64>,
    /// 24h low.
    pub low_24h: Option<f64>,
    /// Absolute price change over 24h.
    pub price_change_24h: Option<f64>,
    /// Price change over 24h in percent.
    pub price_change_percentage_24h: Option<f64>,
    /// Absolute market cap change over 24h.
    pub market_cap_change_24h: Option<f64>,
    /// Market cap change over 24h in percent.
    pub market_cap_change_percentage_24h: Option<f64>,
    /// Circulating supply.
    pub circulating_supply: Option<f64>,
    /// Total supply.
    pub total_supply: Option<f64>,
    /// Maximum supply.
    pub max_supply: Option<f64>,
    /// All-time high price.
    pub ath: Option<f64>,
    /// Distance from the all-time high in percent.
    pub ath_change_percentage: Option<f64>,
    /// Date of the all-time high (RFC 3339).
    pub ath_date: Option<String>,
    /// Return on investment, when the provider tracks one.
    pub roi: Option<Roi>,
    /// Provider timestamp of the last update (RFC 3339).
    pub last_updated: Option<String>,
    /// Seven-day price series.
    pub sparkline_in_7d: Option<Sparkline>,
    /// Price change over 1h in percent.
    pub price_change_percentage_1h_in_currency: Option<f64>,
    /// Price change over 24h in percent.
    pub price_change_percentage_24h_in_currency: Option<f64>,
    /// Price change over 7d in percent.
    pub price_change_percentage_7d_in_currency: Option<f64>,
    /// Price change over 30d in percent.
    pub price_change_percentage_30d_in_currency: Option<f64>,
    /// Price change over 1y in percent.
    pub price_change_percentage_1y_in_currency: Option<f64>,
}

impl InstrumentSnapshot {
    /// Snapshot with only the identifying fields set.
    pub fn new(id: &str, symbol: &str, name: &str) -> Self {
        InstrumentSnapshot {
            id: String::from(id),
            symbol: String::from(symbol),
            name: String::from(name),
            image: None,
            current_price: None,
            market_cap: None,
            market_cap_rank: None,
            total_volume: None,
            high_24h: None,
            low_24h: None,
            price_change_24h: None,
            price_change_percentage_24h: None,
            market_cap_change_24h: None,
            market_cap_change_percentage_24h: None,
            circulating_supply: None,
            total_supply: None,
            max_supply: None,
            ath: None,
            ath_change_percentage: None,
            ath_date: None,
            roi: None,
            last_updated: None,
            sparkline_in_7d: None,
            price_change_percentage_1h_in_currency: None,
            price_change_percentage_24h_in_currency: None,
            price_change_percentage_7d_in_currency: None,
            price_change_percentage_30d_in_currency: None,
            price_change_percentage_1y_in_currency: None,
        }
    }

    /// Parsed `last_updated`, if present and valid RFC 3339.
    pub fn last_updated_at(&self) -> Option<DateTime<Utc>> {
        self.last_updated
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|ts| ts.with_timezone(&Utc))
    }

    /// Encode the snapshot into a bus message.
    pub fn encode(&self) -> Result<EncodedMessage> {
        let config = bincode::config::standard().with_limit::<MAX_MESSAGE_BYTES>();
        let bytes = bincode::encode_to_vec(self, config)?;
        Ok(EncodedMessage(bytes))
    }

    /// Decode a bus message body into a snapshot.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let config = bincode::config::standard().with_limit::<MAX_MESSAGE_BYTES>();
        let (snapshot, read) = bincode::decode_from_slice::<Self, _>(bytes, config)?;
        if read != bytes.len() {
            return Err(CoinError::Format(format!(
                "{} trailing bytes after snapshot {}",
                bytes.len() - read,
                snapshot.id
            )));
        }
        Ok(snapshot)
    }
}

/// Serialized form of exactly one `InstrumentSnapshot`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedMessage(Vec<u8>);

impl EncodedMessage {
    /// Message body.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Body length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `true` for a zero-length body.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Take the body out of the message.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for EncodedMessage {
    fn from(bytes: Vec<u8>) -> Self {
        EncodedMessage(bytes)
    }
}
