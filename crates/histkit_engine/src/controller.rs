//! Signal-driven sync lifecycle.

use crate::processor::TransactionProcessor;
use histkit_core::ChangeLog;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn, Level};

const STOP_POLL_INTERVAL: Duration = Duration::from_millis(50);

struct Worker {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Subscribes to the change log's signal and drives the processor once
/// per wake-up.
///
/// The worker thread handles signals cooperatively, one at a time:
/// queued wake-ups accumulated while a cycle ran are drained into a
/// single extra cycle. Stopping prevents new cycles from starting but
/// never aborts an in-flight one.
pub struct SyncController {
    processor: Arc<TransactionProcessor>,
    log: Arc<dyn ChangeLog>,
    worker: Mutex<Option<Worker>>,
}

impl SyncController {
    /// Creates a controller driving `processor` from `log`'s signal.
    pub fn new(processor: Arc<TransactionProcessor>, log: Arc<dyn ChangeLog>) -> Self {
        Self {
            processor,
            log,
            worker: Mutex::new(None),
        }
    }

    /// Subscribes and starts the worker thread.
    ///
    /// Starting an already-running controller is a no-op.
    pub fn start(&self) {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            debug!("controller already running");
            return;
        }

        let receiver = self.log.subscribe();
        let stop = Arc::new(AtomicBool::new(false));
        let processor = Arc::clone(&self.processor);

        let thread_stop = Arc::clone(&stop);
        let handle = std::thread::spawn(move || {
            info!("sync controller started");
            loop {
                match receiver.recv_timeout(STOP_POLL_INTERVAL) {
                    Ok(()) => {
                        // Drain wake-ups that piled up; one cycle covers
                        // them all.
                        while receiver.try_recv().is_ok() {}
                        if thread_stop.load(Ordering::SeqCst) {
                            break;
                        }
                        if let Err(err) = processor.process() {
                            match err.severity() {
                                Level::WARN => {
                                    warn!(%err, "processing cycle failed, awaiting next signal");
                                }
                                _ => {
                                    error!(%err, "processing cycle failed, awaiting next signal");
                                }
                            }
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => {
                        if thread_stop.load(Ordering::SeqCst) {
                            break;
                        }
                    }
                    Err(RecvTimeoutError::Disconnected) => {
                        debug!("change signal source dropped");
                        break;
                    }
                }
            }
            info!("sync controller stopped");
        });

        *worker = Some(Worker { stop, handle });
    }

    /// Stops the worker thread.
    ///
    /// Blocks until the worker exits; an in-flight cycle finishes
    /// first. Stopping a stopped controller is a no-op.
    pub fn stop(&self) {
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            worker.stop.store(true, Ordering::SeqCst);
            if worker.handle.join().is_err() {
                warn!("controller worker thread panicked");
            }
        }
    }

    /// Returns true if the worker thread is running.
    pub fn is_running(&self) -> bool {
        self.worker.lock().is_some()
    }
}

impl Drop for SyncController {
    fn drop(&mut self) {
        self.stop();
    }
}
