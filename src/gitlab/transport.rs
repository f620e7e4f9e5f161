use std::sync::Arc;

use futures::StreamExt;
use log::debug;
use reqwest::Client;
use tokio::sync::{mpsc, Semaphore};
use url::Url;

use crate::error::{GlFetchError, Result};

use super::store::Handle;

/// Progress of one transfer, tagged with the handle that requested it.
#[derive(Debug)]
pub enum TransferEvent {
    /// A piece of the response body, in arrival order.
    Chunk { tag: Handle, data: Vec<u8> },
    /// The transfer finished; no more chunks follow for this tag.
    Done { tag: Handle, result: Result<()> },
}

pub type EventSender = mpsc::UnboundedSender<TransferEvent>;

/// Issues GET requests without waiting on them.
///
/// Implementations report every received body chunk and exactly one
/// completion per started request through `events`.
pub trait Transport {
    fn start(&self, tag: Handle, url: Url, events: EventSender);
}

/// [`Transport`] backed by a shared reqwest client.
///
/// Each request runs in its own tokio task. A semaphore caps how many
/// transfers hold a connection at once; the rest queue until a permit frees.
pub struct HttpTransport {
    client: Client,
    permits: Arc<Semaphore>,
}

impl HttpTransport {
    pub fn new(client: Client, max_connections: usize) -> Self {
        Self {
            client,
            permits: Arc::new(Semaphore::new(max_connections.max(1))),
        }
    }
}

impl Transport for HttpTransport {
    fn start(&self, tag: Handle, url: Url, events: EventSender) {
        let client = self.client.clone();
        let permits = Arc::clone(&self.permits);

        tokio::spawn(async move {
            let result = transfer(&client, &permits, tag, url, &events).await;
            // The receiver is gone only when the orchestrator stopped caring.
            let _ = events.send(TransferEvent::Done { tag, result });
        });
    }
}

async fn transfer(
    client: &Client,
    permits: &Semaphore,
    tag: Handle,
    url: Url,
    events: &EventSender,
) -> Result<()> {
    let _permit = permits
        .acquire()
        .await
        .map_err(|e| GlFetchError::Transfer(format!("connection limiter closed: {e}")))?;

    debug!("GET {url}");
    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| transfer_error(&e))?;
    let status = response.status();

    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| transfer_error(&e))?;
        if events
            .send(TransferEvent::Chunk {
                tag,
                data: chunk.to_vec(),
            })
            .is_err()
        {
            return Ok(());
        }
    }

    debug!("GET {url} finished with status {status}");
    if !status.is_success() {
        return Err(GlFetchError::HttpStatus {
            status: status.as_u16(),
        });
    }

    Ok(())
}

fn transfer_error(err: &reqwest::Error) -> GlFetchError {
    let kind = if err.is_timeout() {
        "timed out"
    } else if err.is_connect() {
        "connection failed"
    } else if err.is_body() || err.is_decode() {
        "body read failed"
    } else {
        "request failed"
    };
    GlFetchError::Transfer(format!("{kind}: {err}"))
}
