//! Background fetch task.
//!
//! Runs a [`Fetcher`] on its own thread and exposes the progress stream as
//! a channel, so the caller's thread never blocks on network or disk I/O.

use crate::core::fetch::{CancelHandle, FetchOutcome, FetchProgress, FetchRequest, Fetcher};
use crate::core::progress::ProgressObserver;
use crate::error::{AedictError, Result};
use crossbeam_channel::{Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Item of the event stream of a [`FetchTask`].
///
/// Zero or more `Progress` events are followed by exactly one `Finished`.
#[derive(Debug)]
pub enum FetchEvent {
    Progress(FetchProgress),
    Finished(FetchOutcome),
}

struct ChannelObserver {
    tx: Sender<FetchEvent>,
}

impl ProgressObserver for ChannelObserver {
    fn on_progress(&mut self, progress: FetchProgress) {
        // The receiver may be gone if the owner stopped listening.
        let _ = self.tx.send(FetchEvent::Progress(progress));
    }
}

pub struct FetchTask {
    cancel: CancelHandle,
    events: Receiver<FetchEvent>,
    worker: Option<JoinHandle<()>>,
}

impl FetchTask {
    /// Spawns the worker thread and starts fetching immediately.
    pub fn start(fetcher: Arc<Fetcher>, request: FetchRequest) -> Result<Self> {
        let (tx, events) = crossbeam_channel::unbounded();
        let cancel = CancelHandle::new();
        let worker_cancel = cancel.clone();

        let worker = std::thread::Builder::new()
            .name(format!("fetch-{}", request.name))
            .spawn(move || {
                let mut observer = ChannelObserver { tx: tx.clone() };
                let outcome = fetcher.fetch(&request, &worker_cancel, &mut observer);
                let _ = tx.send(FetchEvent::Finished(outcome));
            })?;

        Ok(Self {
            cancel,
            events,
            worker: Some(worker),
        })
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn events(&self) -> &Receiver<FetchEvent> {
        &self.events
    }

    /// Forwards progress to `observer` until the task finishes.
    pub fn join(mut self, observer: &mut dyn ProgressObserver) -> FetchOutcome {
        let mut outcome = None;
        for event in self.events.iter() {
            match event {
                FetchEvent::Progress(progress) => observer.on_progress(progress),
                FetchEvent::Finished(finished) => {
                    outcome = Some(finished);
                    break;
                }
            }
        }

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("Fetch worker panicked");
            }
        }

        outcome.unwrap_or_else(|| {
            FetchOutcome::Failed(Arc::new(AedictError::Transfer(std::io::Error::other(
                "fetch worker terminated unexpectedly",
            ))))
        })
    }
}
