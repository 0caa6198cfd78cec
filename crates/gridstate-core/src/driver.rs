//! Async driver: runs fetches as background tokio tasks and feeds their
//! outcomes back into a [`TableController`].
//!
//! Responses are handed to the controller in arrival order; the controller's
//! sequence check decides which one is applied. Nothing here blocks on a
//! fetch except [`TableDriver::next_response`] and [`TableDriver::settle`].
//!
//! A fetcher that panics is reported as a [`FetchError::Transport`] failure.
//! Tasks aborted in favour of a newer request report [`FetchError::Cancelled`].

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::controller::{FetchRequest, ResponseOutcome, TableController};
use crate::error::{FetchError, GridError, Result};
use crate::fetch::{FetchResult, Fetcher};

/// A fetch outcome tagged with the sequence token of its request.
type Response = (u64, std::result::Result<FetchResult, FetchError>);

pub struct TableDriver<F: Fetcher + 'static> {
    controller: TableController,
    fetcher: Arc<F>,
    sender: mpsc::UnboundedSender<Response>,
    receiver: mpsc::UnboundedReceiver<Response>,
    tasks: Vec<(u64, JoinHandle<()>)>,
    dispatched: u64,
}

impl<F: Fetcher + 'static> TableDriver<F> {
    pub fn new(controller: TableController, fetcher: Arc<F>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        info!(table = %controller.config().table_id, "TableDriver initialized");
        Self {
            controller,
            fetcher,
            sender,
            receiver,
            tasks: Vec::new(),
            dispatched: 0,
        }
    }

    pub fn controller(&self) -> &TableController {
        &self.controller
    }

    /// Runs a controller mutation and dispatches whatever request it issued.
    ///
    /// ```ignore
    /// driver.update(|table| table.apply_sort("name", false))?;
    /// ```
    pub fn update<R>(&mut self, mutate: impl FnOnce(&mut TableController) -> R) -> R {
        let result = mutate(&mut self.controller);
        self.dispatch_pending();
        result
    }

    /// Issues the initial (or a refresh) request.
    pub fn load(&mut self) -> u64 {
        self.update(|table| table.load().seq)
    }

    pub fn retry(&mut self) -> u64 {
        self.update(|table| table.retry().seq)
    }

    fn dispatch_pending(&mut self) {
        let request = match self.controller.pending_request() {
            Some(request) if request.seq > self.dispatched => request.clone(),
            _ => return,
        };
        self.dispatch(request);
    }

    fn dispatch(&mut self, request: FetchRequest) {
        self.tasks.retain(|(_, handle)| !handle.is_finished());
        if self.controller.config().abort_superseded {
            for (seq, handle) in self.tasks.drain(..) {
                debug!(seq, "Aborting superseded request");
                handle.abort();
                let _ = self.sender.send((seq, Err(FetchError::Cancelled)));
            }
        }

        let seq = request.seq;
        let fetcher = Arc::clone(&self.fetcher);
        let sender = self.sender.clone();
        let timeout_ms = self.controller.config().fetch_timeout_ms;
        let handle = tokio::spawn(async move {
            let params = request.params;
            let fetch = async {
                match timeout_ms {
                    Some(ms) => tokio::time::timeout(Duration::from_millis(ms), fetcher.fetch(&params))
                        .await
                        .unwrap_or(Err(FetchError::Timeout(ms))),
                    None => fetcher.fetch(&params).await,
                }
            };
            let outcome = match AssertUnwindSafe(fetch).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(panic) => {
                    let message = panic_message(&panic);
                    warn!(seq, %message, "Fetcher panicked");
                    Err(FetchError::Transport(format!("fetcher panicked: {}", message)))
                }
            };
            // The driver may have been dropped; nobody is waiting then.
            let _ = sender.send((seq, outcome));
        });
        self.tasks.push((seq, handle));
        self.dispatched = seq;
    }

    /// Waits for the next response to arrive and hands it to the controller.
    pub async fn next_response(&mut self) -> Result<(u64, ResponseOutcome)> {
        let (seq, outcome) = self.receiver.recv().await.ok_or(GridError::ChannelClosed)?;
        self.tasks.retain(|(task_seq, _)| *task_seq != seq);
        let applied = match outcome {
            Ok(result) => self
                .controller
                .on_results_received(seq, result.rows, result.total_count),
            Err(error) => self.controller.on_request_failed(seq, error),
        };
        // Applying a response may itself issue a follow-up request.
        self.dispatch_pending();
        Ok((seq, applied))
    }

    /// Processes responses until the latest request has been answered.
    /// Returns immediately when nothing is pending.
    pub async fn settle(&mut self) -> Result<()> {
        while self.controller.pending_request().is_some() {
            self.next_response().await?;
        }
        Ok(())
    }

    /// Number of fetch tasks that have not reported back yet.
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }
}

fn panic_message(panic: &Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl<F: Fetcher + 'static> Drop for TableDriver<F> {
    fn drop(&mut self) {
        for (_, handle) in self.tasks.drain(..) {
            handle.abort();
        }
    }
}
