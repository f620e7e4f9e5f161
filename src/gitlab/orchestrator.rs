use std::collections::BTreeSet;
use std::time::Duration;

use log::{debug, warn};
use tokio::sync::mpsc;
use tokio::time::timeout;
use url::Url;

use crate::error::{GlFetchError, Result};

use super::store::{Handle, ProjectStore};
use super::transport::{TransferEvent, Transport};

/// Result of one transfer, routed back to the project that requested it.
#[derive(Debug)]
pub struct Completion {
    pub handle: Handle,
    pub result: Result<()>,
}

/// Drives a set of concurrent transfers until every one has completed.
///
/// All store mutations happen on the task that calls [`Orchestrator::run_batch`];
/// transport tasks only talk to it through the event channel.
pub struct Orchestrator<T: Transport> {
    transport: T,
    poll_interval: Duration,
}

impl<T: Transport> Orchestrator<T> {
    pub fn new(transport: T, poll_interval: Duration) -> Self {
        Self {
            transport,
            poll_interval,
        }
    }

    /// Fetches every `(handle, url)` target and appends each response body to
    /// its project's buffer.
    ///
    /// Every target is issued before the first wait. Completions are returned in
    /// the order the transport reported them. A failed transfer is logged and
    /// recorded, and the remaining transfers keep going.
    pub async fn run_batch(
        &self,
        store: &mut ProjectStore,
        targets: Vec<(Handle, Url)>,
    ) -> Vec<Completion> {
        let (events, mut inbox) = mpsc::unbounded_channel();
        let mut in_flight = BTreeSet::new();

        for (handle, url) in targets {
            if !in_flight.insert(handle) {
                warn!("Skipping duplicate transfer for {handle:?}: {url}");
                continue;
            }
            self.transport.start(handle, url, events.clone());
        }
        // Only transport tasks hold senders now, so a closed channel means
        // nothing else can arrive.
        drop(events);

        let mut completions = Vec::with_capacity(in_flight.len());
        loop {
            while let Ok(event) = inbox.try_recv() {
                dispatch(store, &mut in_flight, &mut completions, event);
            }

            if in_flight.is_empty() {
                break;
            }

            match timeout(self.poll_interval, inbox.recv()).await {
                Ok(Some(event)) => dispatch(store, &mut in_flight, &mut completions, event),
                Ok(None) => {
                    for handle in std::mem::take(&mut in_flight) {
                        let error = GlFetchError::Transfer(
                            "transfer ended without reporting completion".to_string(),
                        );
                        log_failure(store, handle, &error);
                        completions.push(Completion {
                            handle,
                            result: Err(error),
                        });
                    }
                    break;
                }
                Err(_) => debug!("Waiting on {} transfers...", in_flight.len()),
            }
        }

        completions
    }
}

fn dispatch(
    store: &mut ProjectStore,
    in_flight: &mut BTreeSet<Handle>,
    completions: &mut Vec<Completion>,
    event: TransferEvent,
) {
    match event {
        TransferEvent::Chunk { tag, data } => {
            if !in_flight.contains(&tag) {
                debug!("Dropping {} bytes for inactive {tag:?}", data.len());
                return;
            }
            match store.get_mut(tag) {
                Some(project) => project.buffer.extend_from_slice(&data),
                None => debug!("Dropping {} bytes for stale {tag:?}", data.len()),
            }
        }
        TransferEvent::Done { tag, result } => {
            if !in_flight.remove(&tag) {
                debug!("Ignoring completion for inactive {tag:?}");
                return;
            }
            if let Err(error) = &result {
                log_failure(store, tag, error);
            }
            completions.push(Completion {
                handle: tag,
                result,
            });
        }
    }
}

fn log_failure(store: &ProjectStore, handle: Handle, error: &GlFetchError) {
    match store.get(handle) {
        Some(project) => warn!("Failed to fetch from API: id={} err={error}", project.id()),
        None => warn!("Failed to fetch from API for {handle:?}: {error}"),
    }
}
