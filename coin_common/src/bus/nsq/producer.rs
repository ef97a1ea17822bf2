//! NSQ producer: publishes message bodies to `nsqd` over one TCP connection.
//!
//! Each `publish` writes one `PUB` and waits for `OK` or an error frame; heartbeats
//! arriving in between are answered with `NOP`. A publish that fails drops the
//! connection, and the next publish dials again. There is no retry of the failed
//! message itself.
use std::io::BufReader;
use std::net::{Shutdown, TcpStream};

use log::{debug, info, warn};

use crate::bus::Publisher;
use crate::bus::nsq::protocol::{self, Frame, HEARTBEAT, MAGIC_V2, OK};
use crate::error::CoinError;
use crate::result::Result;

struct ProducerConn {
    writer: TcpStream,
    reader: BufReader<TcpStream>,
}

/// Publisher talking to a single `nsqd`.
pub struct NsqProducer {
    addr: String,
    conn: Option<ProducerConn>,
}

impl NsqProducer {
    /// Connect to `nsqd` at `addr` (e.g., `127.0.0.1:4150`).
    ///
    /// Failing to connect here is a startup failure for the caller.
    pub fn connect(addr: &str) -> Result<Self> {
        let conn = Self::dial(addr)?;
        info!("NSQ producer connected to {}", addr);
        Ok(Self {
            addr: addr.to_string(),
            conn: Some(conn),
        })
    }

    fn dial(addr: &str) -> Result<ProducerConn> {
        let mut writer = TcpStream::connect(addr)
            .map_err(|e| CoinError::Bus(format!("connect {}: {}", addr, e)))?;
        writer.set_nodelay(true)?;
        std::io::Write::write_all(&mut writer, MAGIC_V2)?;
        let reader = BufReader::new(writer.try_clone()?);
        Ok(ProducerConn { writer, reader })
    }

    fn publish_on(conn: &mut ProducerConn, topic: &str, body: &[u8]) -> Result<()> {
        protocol::write_pub(&mut conn.writer, topic, body)?;
        loop {
            match protocol::read_frame(&mut conn.reader)? {
                Frame::Response(data) if data == HEARTBEAT => {
                    debug!("NSQ heartbeat");
                    protocol::write_command(&mut conn.writer, "NOP")?;
                }
                Frame::Response(data) if data == OK => return Ok(()),
                Frame::Response(data) => {
                    return Err(CoinError::Bus(format!(
                        "unexpected response {}",
                        String::from_utf8_lossy(&data)
                    )));
                }
                Frame::Error(data) => {
                    return Err(CoinError::Bus(String::from_utf8_lossy(&data).into_owned()));
                }
                Frame::Message(_) => {
                    return Err(CoinError::Bus("message frame on producer connection".into()));
                }
            }
        }
    }
}

impl Publisher for NsqProducer {
    fn publish(&mut self, topic: &str, body: &[u8]) -> Result<()> {
        if self.conn.is_none() {
            self.conn = Some(Self::dial(&self.addr)?);
            info!("NSQ producer reconnected to {}", self.addr);
        }
        let result = match self.conn.as_mut() {
            Some(conn) => Self::publish_on(conn, topic, body),
            None => return Err(CoinError::Bus(format!("no connection to {}", self.addr))),
        };
        if let Err(e) = &result {
            // Error frames leave the connection usable; anything else does not.
            if !matches!(e, CoinError::Bus(msg) if msg.starts_with("E_")) {
                warn!("NSQ producer connection to {} dropped: {}", self.addr, e);
                if let Some(conn) = self.conn.take() {
                    let _ = conn.writer.shutdown(Shutdown::Both);
                }
            }
        }
        result
    }

    fn stop(&mut self) {
        if let Some(conn) = self.conn.take() {
            let _ = conn.writer.shutdown(Shutdown::Both);
            info!("NSQ producer disconnected from {}", self.addr);
        }
    }
}
