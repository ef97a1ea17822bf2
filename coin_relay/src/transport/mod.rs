//! Connection-recycling HTTP transport for provider requests.
//!
//! The transport owns at most one provider connection at a time. Every `acquire`
//! first tears down the connection it is holding, then dials a fresh one within the
//! dial deadline, so a request never reuses a stale or half-broken socket. The held
//! socket is shared through a `ConnectionHandle`; closing it from another thread
//! (the recycle timer or the shutdown coordinator) shuts the socket down under the
//! response reader, which then sees end-of-stream or a read error.
//!
//! Failures are returned to the caller and never retried here.
use std::io::{BufReader, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use coin_common::{CoinError, Result};
use log::{debug, info};
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned};

pub mod endpoint;
pub mod http;
pub mod recycler;

pub use endpoint::{Endpoint, Scheme};
pub use recycler::ConnectionRecycler;

const USER_AGENT: &str = concat!("coin_relay/", env!("CARGO_PKG_VERSION"));

trait Connection: Read + Write + Send {}

impl<T: Read + Write + Send> Connection for T {}

/// A `GET` request to a provider endpoint.
#[derive(Debug, Clone)]
pub struct Request {
    endpoint: Endpoint,
    target: String,
}

impl Request {
    /// `GET target` on `endpoint`.
    pub fn get(endpoint: &Endpoint, target: String) -> Self {
        Self {
            endpoint: endpoint.clone(),
            target,
        }
    }

    /// Endpoint the request goes to.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Path and query.
    pub fn target(&self) -> &str {
        &self.target
    }

    fn head(&self) -> String {
        format!(
            "GET {} HTTP/1.1\r\nHost: {}\r\nUser-Agent: {}\r\nAccept: application/json\r\nConnection: close\r\n\r\n",
            self.target,
            self.endpoint.authority(),
            USER_AGENT
        )
    }
}

/// Response with a lazily read body.
pub struct Response {
    status: u16,
    body: Box<dyn Read + Send>,
}

impl Response {
    /// HTTP status code (always 2xx; other statuses are errors).
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Body reader. Reads fail or end early if the connection is torn down.
    pub fn into_body(self) -> Box<dyn Read + Send> {
        self.body
    }
}

#[derive(Debug, Default)]
struct Held {
    stream: Option<TcpStream>,
    shut_down: bool,
}

/// Shared handle to the transport's held connection.
#[derive(Debug, Clone, Default)]
pub struct ConnectionHandle {
    held: Arc<Mutex<Held>>,
}

impl ConnectionHandle {
    /// Shut down and drop the held connection. Returns whether one was held.
    pub fn close(&self) -> Result<bool> {
        let stream = self.held.lock()?.stream.take();
        Ok(teardown(stream))
    }

    /// Close the held connection and refuse every later one. Returns whether a
    /// connection was held.
    pub fn shutdown(&self) -> Result<bool> {
        let stream = {
            let mut held = self.held.lock()?;
            held.shut_down = true;
            held.stream.take()
        };
        Ok(teardown(stream))
    }

    /// Whether `shutdown` has been called.
    pub fn is_shut_down(&self) -> Result<bool> {
        Ok(self.held.lock()?.shut_down)
    }

    /// Whether a connection is currently held.
    pub fn is_held(&self) -> Result<bool> {
        Ok(self.held.lock()?.stream.is_some())
    }

    pub(crate) fn hold(&self, stream: TcpStream) -> Result<()> {
        let mut held = self.held.lock()?;
        if held.shut_down {
            drop(held);
            teardown(Some(stream));
            return Err(CoinError::Network("transport is shut down".into()));
        }
        held.stream = Some(stream);
        Ok(())
    }
}

fn teardown(stream: Option<TcpStream>) -> bool {
    match stream {
        Some(stream) => {
            if let Err(e) = stream.shutdown(Shutdown::Both) {
                debug!("Held connection was already down: {}", e);
            }
            true
        }
        None => false,
    }
}

/// HTTP(S) transport that dials a fresh connection for every request.
pub struct Transport {
    held: ConnectionHandle,
    dial_timeout: Duration,
    tls: Arc<ClientConfig>,
}

impl Transport {
    /// Transport with the given connect deadline.
    pub fn new(dial_timeout: Duration) -> Result<Self> {
        Ok(Self {
            held: ConnectionHandle::default(),
            dial_timeout,
            tls: tls_config()?,
        })
    }

    /// Handle for closing the held connection from other threads.
    pub fn handle(&self) -> ConnectionHandle {
        self.held.clone()
    }

    /// Send `request` on a new connection and return the response once its head is read.
    pub fn acquire(&self, request: &Request) -> Result<Response> {
        if self.held.is_shut_down()? {
            return Err(CoinError::Network("transport is shut down".into()));
        }
        if self.held.close()? {
            debug!("Closed previous provider connection before dialing");
        }

        let endpoint = request.endpoint();
        let stream = self.dial(endpoint)?;
        self.held.hold(stream.try_clone()?)?;

        let mut conn: Box<dyn Connection> = match endpoint.scheme() {
            Scheme::Http => Box::new(stream),
            Scheme::Https => {
                let name = ServerName::try_from(endpoint.host().to_string())
                    .map_err(|e| CoinError::Tls(format!("{}: {}", endpoint.host(), e)))?;
                let client = ClientConnection::new(Arc::clone(&self.tls), name)
                    .map_err(|e| CoinError::Tls(e.to_string()))?;
                Box::new(StreamOwned::new(client, stream))
            }
        };

        let addr = endpoint.socket_addr();
        conn.write_all(request.head().as_bytes())
            .and_then(|_| conn.flush())
            .map_err(|e| CoinError::Network(format!("send to {}: {}", addr, e)))?;

        let mut reader = BufReader::new(conn);
        let head = http::read_head(&mut reader)?;
        if !head.is_success() {
            return Err(CoinError::HttpStatus {
                status: head.status,
                reason: head.reason,
            });
        }
        debug!("{} {} -> {}", addr, request.target(), head.status);

        Ok(Response {
            status: head.status,
            body: http::body_reader(&head, reader),
        })
    }

    fn dial(&self, endpoint: &Endpoint) -> Result<TcpStream> {
        let addr = endpoint.socket_addr();
        let candidates: Vec<SocketAddr> = addr
            .to_socket_addrs()
            .map_err(|e| CoinError::Network(format!("resolve {}: {}", addr, e)))?
            .collect();

        let mut last_err = CoinError::Network(format!("no addresses for {}", addr));
        for candidate in candidates {
            match TcpStream::connect_timeout(&candidate, self.dial_timeout) {
                Ok(stream) => {
                    info!("Connected to {} ({})", addr, candidate);
                    return Ok(stream);
                }
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                    last_err = CoinError::DialTimeout {
                        addr: addr.clone(),
                        timeout: self.dial_timeout,
                    };
                }
                Err(e) => {
                    last_err = CoinError::Network(format!("connect {}: {}", candidate, e));
                }
            }
        }
        Err(last_err)
    }
}

fn tls_config() -> Result<Arc<ClientConfig>> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let config = ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .map_err(|e| CoinError::Tls(e.to_string()))?
    .with_root_certificates(roots)
    .with_no_client_auth();
    Ok(Arc::new(config))
}
