//! NSQ consumer: subscribes a handler to a topic/channel on one `nsqd`.
//!
//! A reader thread decodes frames and hands messages to a pool of worker threads over a
//! bounded channel sized to the `RDY` count. Workers run the handler and always answer
//! `FIN`, so a message the handler could not use is still acknowledged. Heartbeats
//! are answered with `NOP` from the reader thread.
//!
//! Stopping sends `CLS`; `nsqd` replies `CLOSE_WAIT` and stops delivering, the reader
//! exits, workers finish what they already hold and the socket is shut down.
use std::io::{BufReader, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Sender, bounded};
use log::{debug, error, info, warn};

use crate::bus::nsq::protocol::{self, CLOSE_WAIT, Frame, HEARTBEAT, MAGIC_V2, NsqMessage, OK};
use crate::bus::{MessageHandler, Subscriber, Subscription};
use crate::error::CoinError;
use crate::result::Result;

/// Subscriber connecting directly to one `nsqd`.
#[derive(Debug, Clone)]
pub struct NsqSubscriber {
    addr: String,
    max_in_flight: u32,
}

impl NsqSubscriber {
    /// Subscriber for `nsqd` at `addr` allowing `max_in_flight` unacknowledged messages.
    pub fn new(addr: &str, max_in_flight: u32) -> Self {
        Self {
            addr: addr.to_string(),
            max_in_flight: max_in_flight.max(1),
        }
    }
}

fn expect_ok(reader: &mut BufReader<TcpStream>, writer: &mut TcpStream) -> Result<()> {
    loop {
        match protocol::read_frame(reader)? {
            Frame::Response(data) if data == HEARTBEAT => protocol::write_command(writer, "NOP")?,
            Frame::Response(data) if data == OK => return Ok(()),
            Frame::Error(data) => {
                return Err(CoinError::Bus(String::from_utf8_lossy(&data).into_owned()));
            }
            other => return Err(CoinError::Bus(format!("unexpected frame {:?}", other))),
        }
    }
}

impl Subscriber for NsqSubscriber {
    fn subscribe(
        &self,
        topic: &str,
        group: &str,
        concurrency: usize,
        handler: MessageHandler,
    ) -> Result<Box<dyn Subscription>> {
        protocol::validate_name(topic)?;
        protocol::validate_name(group)?;

        let mut writer = TcpStream::connect(&self.addr)
            .map_err(|e| CoinError::Bus(format!("connect {}: {}", self.addr, e)))?;
        writer.set_nodelay(true)?;
        writer.write_all(MAGIC_V2)?;
        let mut reader = BufReader::new(writer.try_clone()?);

        protocol::write_command(&mut writer, &format!("SUB {} {}", topic, group))?;
        expect_ok(&mut reader, &mut writer)?;
        protocol::write_command(&mut writer, &format!("RDY {}", self.max_in_flight))?;
        info!(
            "NSQ consumer subscribed to {}/{} on {} (max in flight {})",
            topic, group, self.addr, self.max_in_flight
        );

        let writer = Arc::new(Mutex::new(writer));
        let closing = Arc::new(AtomicBool::new(false));
        let (job_tx, job_rx) = bounded::<NsqMessage>(self.max_in_flight as usize);

        let reader_thread = {
            let writer = Arc::clone(&writer);
            let closing = Arc::clone(&closing);
            thread::Builder::new()
                .name(format!("nsq-{}-reader", group))
                .spawn(move || read_loop(reader, writer, job_tx, closing))?
        };

        let mut workers = Vec::with_capacity(concurrency.max(1));
        for n in 0..concurrency.max(1) {
            let job_rx = job_rx.clone();
            let writer = Arc::clone(&writer);
            let handler = Arc::clone(&handler);
            let worker = thread::Builder::new()
                .name(format!("nsq-{}-{}", group, n))
                .spawn(move || {
                    for msg in job_rx.iter() {
                        if msg.attempts > 1 {
                            debug!("Redelivered message, attempt {}", msg.attempts);
                        }
                        handler(msg.body.as_slice());
                        let fin = writer
                            .lock()
                            .map_err(CoinError::from)
                            .and_then(|mut w| protocol::write_fin(&mut *w, &msg.id));
                        if let Err(e) = fin {
                            warn!("FIN failed, message will be redelivered: {}", e);
                        }
                    }
                })?;
            workers.push(worker);
        }

        Ok(Box::new(NsqSubscription {
            writer,
            closing,
            reader: reader_thread,
            workers,
        }))
    }
}

fn read_loop(
    mut reader: BufReader<TcpStream>,
    writer: Arc<Mutex<TcpStream>>,
    jobs: Sender<NsqMessage>,
    closing: Arc<AtomicBool>,
) {
    loop {
        match protocol::read_frame(&mut reader) {
            Ok(Frame::Message(msg)) => {
                if jobs.send(msg).is_err() {
                    break;
                }
            }
            Ok(Frame::Response(data)) if data == HEARTBEAT => {
                let nop = writer
                    .lock()
                    .map_err(CoinError::from)
                    .and_then(|mut w| protocol::write_command(&mut *w, "NOP"));
                if let Err(e) = nop {
                    error!("Failed to answer NSQ heartbeat: {}", e);
                    break;
                }
            }
            Ok(Frame::Response(data)) if data == CLOSE_WAIT => {
                info!("NSQ consumer: server acknowledged close");
                break;
            }
            Ok(Frame::Response(data)) => {
                debug!("NSQ response: {}", String::from_utf8_lossy(&data));
            }
            Ok(Frame::Error(data)) => {
                warn!("NSQ error frame: {}", String::from_utf8_lossy(&data));
            }
            Err(e) => {
                if !closing.load(Ordering::Acquire) {
                    error!("NSQ consumer connection lost: {}", e);
                }
                break;
            }
        }
    }
}

struct NsqSubscription {
    writer: Arc<Mutex<TcpStream>>,
    closing: Arc<AtomicBool>,
    reader: JoinHandle<()>,
    workers: Vec<JoinHandle<()>>,
}

impl Subscription for NsqSubscription {
    fn stop(self: Box<Self>) {
        let NsqSubscription {
            writer,
            closing,
            reader,
            workers,
        } = *self;
        closing.store(true, Ordering::Release);
        let cls = writer
            .lock()
            .map_err(CoinError::from)
            .and_then(|mut w| protocol::write_command(&mut *w, "CLS"));
        if let Err(e) = cls {
            debug!("CLS not sent: {}", e);
        }
        let _ = reader.join();
        for worker in workers {
            let _ = worker.join();
        }
        if let Ok(stream) = writer.lock() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        info!("NSQ consumer stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, Read};
    use std::net::TcpListener;
    use std::sync::atomic::AtomicUsize;
    use std::time::{Duration, Instant};

    #[test]
    fn delivers_acknowledges_and_closes() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut writer = stream.try_clone().unwrap();
            let mut reader = BufReader::new(stream);
            let mut magic = [0u8; 4];
            reader.read_exact(&mut magic).unwrap();

            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            assert_eq!(line, "SUB coins market\n");
            protocol::write_frame(&mut writer, &Frame::Response(OK.to_vec())).unwrap();

            line.clear();
            reader.read_line(&mut line).unwrap();
            assert_eq!(line, "RDY 4\n");

            let msg = NsqMessage {
                timestamp: 0,
                attempts: 1,
                id: *b"0123456789abcdef",
                body: b"snapshot".to_vec(),
            };
            protocol::write_frame(&mut writer, &Frame::Message(msg)).unwrap();
            protocol::write_frame(&mut writer, &Frame::Response(HEARTBEAT.to_vec())).unwrap();

            let mut seen = Vec::new();
            loop {
                line.clear();
                if reader.read_line(&mut line).unwrap_or(0) == 0 {
                    break;
                }
                if line == "CLS\n" {
                    protocol::write_frame(&mut writer, &Frame::Response(CLOSE_WAIT.to_vec()))
                        .unwrap();
                }
                seen.push(line.trim_end().to_string());
            }
            seen
        });

        let bodies = Arc::new(Mutex::new(Vec::new()));
        let calls = Arc::new(AtomicUsize::new(0));
        let handler: MessageHandler = {
            let bodies = Arc::clone(&bodies);
            let calls = Arc::clone(&calls);
            Arc::new(move |body: &[u8]| {
                bodies.lock().unwrap().push(body.to_vec());
                calls.fetch_add(1, Ordering::SeqCst);
            })
        };

        let subscription = NsqSubscriber::new(&addr, 4)
            .subscribe("coins", "market", 2, handler)
            .unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while calls.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        subscription.stop();

        let seen = server.join().unwrap();
        assert_eq!(*bodies.lock().unwrap(), vec![b"snapshot".to_vec()]);
        assert!(seen.contains(&"FIN 0123456789abcdef".to_string()));
        assert!(seen.contains(&"NOP".to_string()));
        assert!(seen.contains(&"CLS".to_string()));
    }

    #[test]
    fn rejected_subscription_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut writer = stream.try_clone().unwrap();
            let mut reader = BufReader::new(stream);
            let mut magic = [0u8; 4];
            reader.read_exact(&mut magic).unwrap();
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            protocol::write_frame(&mut writer, &Frame::Error(b"E_BAD_TOPIC".to_vec())).unwrap();
        });

        let handler: MessageHandler = Arc::new(|_body: &[u8]| {});
        let result = NsqSubscriber::new(&addr, 1).subscribe("coins", "market", 1, handler);
        assert!(matches!(result, Err(CoinError::Bus(msg)) if msg == "E_BAD_TOPIC"));
        server.join().unwrap();
    }
}
