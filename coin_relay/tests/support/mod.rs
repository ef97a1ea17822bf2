#![allow(dead_code)]

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

use coin_common::bus::Publisher;
use coin_common::{CoinError, Result, WatchList, WatchListStore};
use crossbeam_channel::{Receiver, Sender, unbounded};

/// How the fake provider answers every request.
#[derive(Clone)]
pub enum Reply {
    /// `200 OK` with each frame sent as its own chunk.
    Frames(Vec<String>),
    /// Response head and a partial body, then silence until the client hangs up.
    Stall,
}

/// HTTP server standing in for the market data provider.
pub struct FakeProvider {
    pub url: String,
    pub requests: Receiver<String>,
}

impl FakeProvider {
    pub fn start(reply: Reply) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/api/v3", listener.local_addr().unwrap());
        let (request_tx, requests) = unbounded();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                let reply = reply.clone();
                let request_tx = request_tx.clone();
                thread::spawn(move || serve(stream, reply, request_tx));
            }
        });
        Self { url, requests }
    }
}

fn serve(mut stream: TcpStream, reply: Reply, request_tx: Sender<String>) {
    let mut reader = BufReader::new(stream.try_clone().unwrap());
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).unwrap_or(0) == 0 {
        return;
    }
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).unwrap_or(0) == 0 || line == "\r\n" {
            break;
        }
    }
    let target = request_line.split(' ').nth(1).unwrap_or("").to_string();
    let _ = request_tx.send(target);

    match reply {
        Reply::Frames(frames) => {
            let mut response =
                String::from("HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nTransfer-Encoding: chunked\r\n\r\n");
            for frame in frames {
                response.push_str(&format!("{:x}\r\n{}\r\n", frame.len(), frame));
            }
            response.push_str("0\r\n\r\n");
            let _ = stream.write_all(response.as_bytes());
        }
        Reply::Stall => {
            let _ = stream.write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100000\r\n\r\n[");
            let mut buf = String::new();
            let _ = reader.read_line(&mut buf);
        }
    }
}

/// Provider JSON for one market entry.
pub fn market_json(id: &str, price: f64) -> String {
    format!(
        r#"{{"id":"{id}","symbol":"{id}","name":"{id}","image":null,"current_price":{price},"market_cap":1000000,"market_cap_rank":1,"total_volume":null,"high_24h":{price},"low_24h":{price},"roi":{{"times":1.5,"currency":"usd","percentage":150.0}},"last_updated":"2024-05-01T12:00:00.000Z","sparkline_in_7d":{{"price":[{price},{price}]}},"price_change_percentage_1h_in_currency":0.1,"price_change_percentage_7d_in_currency":-2.5}}"#
    )
}

/// Shared, ordered log of collaborator events.
pub type Events = Arc<Mutex<Vec<String>>>;

/// Watch-list store backed by a fixed list.
pub struct StaticStore {
    list: WatchList,
    closed: Mutex<bool>,
    events: Events,
}

impl StaticStore {
    pub fn new(ids: &[&str], events: Events) -> Self {
        Self {
            list: WatchList::from_ids(ids),
            closed: Mutex::new(false),
            events,
        }
    }
}

impl WatchListStore for StaticStore {
    fn list(&self) -> Result<WatchList> {
        if *self.closed.lock()? {
            return Err(CoinError::StoreClosed);
        }
        Ok(self.list.clone())
    }

    fn close(&self) -> Result<()> {
        *self.closed.lock()? = true;
        self.events.lock()?.push("store closed".to_string());
        Ok(())
    }
}

/// Publisher recording every body it accepts.
#[derive(Clone)]
pub struct RecordingPublisher {
    pub bodies: Arc<Mutex<Vec<Vec<u8>>>>,
    events: Events,
}

impl RecordingPublisher {
    pub fn new(events: Events) -> Self {
        Self {
            bodies: Arc::default(),
            events,
        }
    }

    pub fn published(&self) -> usize {
        self.bodies.lock().unwrap().len()
    }
}

impl Publisher for RecordingPublisher {
    fn publish(&mut self, _topic: &str, body: &[u8]) -> Result<()> {
        self.bodies.lock()?.push(body.to_vec());
        Ok(())
    }

    fn stop(&mut self) {
        self.events.lock().unwrap().push("publisher stopped".to_string());
    }
}
