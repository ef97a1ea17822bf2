//! Periodic force-close of the transport's held connection.
use std::thread::{self, JoinHandle};
use std::time::Duration;

use coin_common::Result;
use crossbeam_channel::{Sender, bounded, select, tick};
use log::{debug, info, warn};

use crate::transport::ConnectionHandle;

/// Background timer bounding the lifetime of provider sockets.
pub struct ConnectionRecycler {
    stop_tx: Sender<()>,
    join: JoinHandle<()>,
}

impl ConnectionRecycler {
    /// Close whatever `handle` holds every `period`, until stopped.
    pub fn spawn(handle: ConnectionHandle, period: Duration) -> Result<Self> {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let ticker = tick(period);
        let join = thread::Builder::new()
            .name("conn-recycler".to_string())
            .spawn(move || {
                loop {
                    select! {
                        recv(ticker) -> _ => match handle.close() {
                            Ok(true) => info!("Recycled provider connection"),
                            Ok(false) => debug!("No provider connection to recycle"),
                            Err(e) => warn!("Connection recycle failed: {}", e),
                        },
                        recv(stop_rx) -> _ => break,
                    }
                }
                debug!("Connection recycler stopped");
            })?;
        Ok(Self { stop_tx, join })
    }

    /// Stop the timer and wait for its thread.
    pub fn stop(self) {
        let _ = self.stop_tx.send(());
        let _ = self.join.join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{TcpListener, TcpStream};
    use std::time::Instant;

    #[test]
    fn closes_held_connection_on_tick() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let stream = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let handle = ConnectionHandle::default();
        handle.hold(stream).unwrap();

        let recycler = ConnectionRecycler::spawn(handle.clone(), Duration::from_millis(20)).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while handle.is_held().unwrap() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        recycler.stop();
        assert!(!handle.is_held().unwrap());
    }
}
