//! In-Flight Deduplicator Module
//!
//! Collapses concurrent resolutions of the same hostname into a single
//! network operation. At most one ticket exists per hostname at any instant;
//! late callers subscribe to the pending ticket's result instead of starting
//! their own resolution.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::cache::Entry;
use crate::error::ResolveError;

type Outcome = Result<Vec<Entry>, ResolveError>;

// == In-Flight Deduplicator ==
/// Tracks one outstanding resolution per hostname.
#[derive(Debug, Default)]
pub struct InFlight {
    tickets: Arc<Mutex<HashMap<String, broadcast::Sender<Outcome>>>>,
}

impl InFlight {
    /// Creates a deduplicator with no pending tickets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `perform` for a hostname, deduplicating concurrent callers.
    ///
    /// If a ticket is already pending for the hostname, awaits and returns
    /// its result without invoking `perform`. Otherwise registers a ticket
    /// and spawns `perform` as a detached task: cancellation of any caller
    /// (this one included) does not cancel the resolution, which runs to
    /// completion and publishes its outcome to every subscriber. The ticket
    /// is deregistered on completion regardless of success or failure.
    pub async fn run<F>(&self, hostname: &str, perform: F) -> Outcome
    where
        F: Future<Output = Outcome> + Send + 'static,
    {
        let mut receiver = {
            let mut tickets = self.tickets.lock().expect("inflight lock poisoned");

            if let Some(sender) = tickets.get(hostname) {
                debug!(hostname, "joining pending resolution");
                sender.subscribe()
            } else {
                let (sender, receiver) = broadcast::channel(1);
                tickets.insert(hostname.to_string(), sender);

                let tickets = Arc::clone(&self.tickets);
                let hostname = hostname.to_string();

                tokio::spawn(async move {
                    let outcome = perform.await;

                    // Deregister before publishing: a caller arriving after
                    // this point starts fresh and reads the already-written
                    // cache instead of a stale ticket
                    let sender = tickets
                        .lock()
                        .expect("inflight lock poisoned")
                        .remove(&hostname);

                    if let Some(sender) = sender {
                        // All receivers may have been cancelled; nothing to do
                        let _ = sender.send(outcome);
                    }
                });

                receiver
            }
        };

        match receiver.recv().await {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(hostname, %error, "in-flight ticket closed without a result");
                Err(ResolveError::not_found(hostname))
            }
        }
    }

    /// Number of currently pending tickets.
    pub fn pending(&self) -> usize {
        self.tickets.lock().expect("inflight lock poisoned").len()
    }
}
