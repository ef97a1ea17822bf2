//! Worker threads that announce their completion.
//!
//! Every pipeline worker runs on its own named thread and sends exactly one
//! completion signal when its body returns. The coordinator blocks on that signal
//! before it moves to the next shutdown state, then joins the thread to collect the
//! worker's totals.
use std::thread::{self, JoinHandle};

use coin_common::{CoinError, Result};
use crossbeam_channel::{Receiver, bounded};
use log::debug;

/// What a finished worker handed back.
#[derive(Debug)]
pub struct Completion<T> {
    /// Value returned by the worker body.
    pub output: T,
    /// Completion signals received; always 1 for a worker that returned.
    pub signals: usize,
}

/// Handle on a running worker thread.
pub struct WorkerHandle<T> {
    name: String,
    done_rx: Receiver<()>,
    join: JoinHandle<T>,
}

impl<T: Send + 'static> WorkerHandle<T> {
    /// Run `body` on a new thread named `name`.
    pub fn spawn<F>(name: &str, body: F) -> Result<Self>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let (done_tx, done_rx) = bounded::<()>(1);
        let join = thread::Builder::new().name(name.to_string()).spawn(move || {
            let output = body();
            let _ = done_tx.send(());
            output
        })?;
        Ok(Self {
            name: name.to_string(),
            done_rx,
            join,
        })
    }

    /// Thread name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the worker body has returned.
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Block until the worker signals completion and collect its output.
    ///
    /// A worker that panicked never signals; this is reported as `WorkerPanicked`.
    pub fn wait(self) -> Result<Completion<T>> {
        let mut signals = usize::from(self.done_rx.recv().is_ok());
        let output = self
            .join
            .join()
            .map_err(|_| CoinError::WorkerPanicked(self.name.clone()))?;
        signals += self.done_rx.try_iter().count();
        debug!("{} completed ({} signal)", self.name, signals);
        Ok(Completion { output, signals })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_is_signalled_once() {
        let worker = WorkerHandle::spawn("adder", || 2 + 2).unwrap();
        assert_eq!(worker.name(), "adder");
        let done = worker.wait().unwrap();
        assert_eq!(done.output, 4);
        assert_eq!(done.signals, 1);
    }

    #[test]
    fn panicking_worker_is_reported() {
        let worker = WorkerHandle::<()>::spawn("boom", || panic!("worker failed")).unwrap();
        let err = worker.wait().err().unwrap();
        assert!(matches!(err, CoinError::WorkerPanicked(name) if name == "boom"));
    }
}
