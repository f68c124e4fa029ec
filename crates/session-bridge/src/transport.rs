//! # Stdio Transport
//!
//! Line-delimited JSON over any async byte stream pair.
//!
//! ```text
//! reader ──lines──→ request tasks ──┐
//!                                    ├──→ writer queue ──→ writer
//! sink ──event stream──→ forwarder ──┘
//! ```
//!
//! Requests run concurrently; responses are written in completion order.

use crate::dispatch::Dispatcher;
use mc_session::SessionService;
use serde_json::json;
use shared_bus::EventFilter;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

/// Depth of the outbound line queue.
const WRITE_QUEUE_DEPTH: usize = 1024;

/// Serve requests from `reader` until it reaches end of input.
///
/// Events published to the service sink are written as `{"event":...}`
/// lines while serving.
pub async fn serve<R, W>(service: Arc<SessionService>, reader: R, writer: W) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (out_tx, out_rx) = mpsc::channel::<String>(WRITE_QUEUE_DEPTH);
    let writer_task = tokio::spawn(write_lines(writer, out_rx));

    let mut events = service.sink().event_stream(EventFilter::all());
    let event_tx = out_tx.clone();
    let forwarder = tokio::spawn(async move {
        while let Some(event) = events.next().await {
            let line = json!({ "event": event.to_json() }).to_string();
            if event_tx.send(line).await.is_err() {
                break;
            }
        }
    });

    let dispatcher = Arc::new(Dispatcher::new(service));
    let mut requests = JoinSet::new();
    let mut lines = BufReader::new(reader).lines();

    let read_result = loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                let dispatcher = Arc::clone(&dispatcher);
                let out = out_tx.clone();
                requests.spawn(async move {
                    let response = dispatcher.handle_line(&line).await;
                    let _ = out.send(response).await;
                });
            }
            Ok(None) => break Ok(()),
            Err(e) => break Err(e),
        }
    };

    debug!(in_flight = requests.len(), "Input closed, draining requests");
    while let Some(joined) = requests.join_next().await {
        if let Err(e) = joined {
            warn!(error = %e, "Request task failed");
        }
    }

    forwarder.abort();
    drop(out_tx);
    match writer_task.await {
        Ok(written) => written?,
        Err(e) => warn!(error = %e, "Writer task failed"),
    }

    info!("Transport stopped");
    read_result
}

async fn write_lines<W>(mut writer: W, mut lines: mpsc::Receiver<String>) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = lines.recv().await {
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    writer.shutdown().await
}
