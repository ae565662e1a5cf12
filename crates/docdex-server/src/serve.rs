//! Newline-delimited JSON server over arbitrary async byte streams.
//!
//! Each request line is handled on its own tokio task; a single writer
//! task owns the output stream so concurrently finishing handlers never
//! interleave bytes.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use docdex_engine::Engine;

use crate::tools::{ToolHandler, ToolRequest, ToolResponse, CODE_INVALID_INPUT};

/// Serve the tool protocol on stdin/stdout until EOF.
pub async fn serve(engine: Arc<Engine>) -> anyhow::Result<()> {
    serve_io(engine, tokio::io::stdin(), tokio::io::stdout()).await
}

pub async fn serve_io<R, W>(engine: Arc<Engine>, reader: R, writer: W) -> anyhow::Result<()>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<String>(32);
    let writer_task = tokio::spawn(async move {
        let mut writer = writer;
        while let Some(line) = rx.recv().await {
            if writer.write_all(line.as_bytes()).await.is_err() {
                break;
            }
            if writer.write_all(b"\n").await.is_err() {
                break;
            }
            if writer.flush().await.is_err() {
                break;
            }
        }
    });

    let handler = ToolHandler::new(engine);
    let mut requests: JoinSet<()> = JoinSet::new();
    let mut lines = BufReader::new(reader).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let handler = handler.clone();
        let tx = tx.clone();
        requests.spawn(async move {
            let response = match serde_json::from_str::<ToolRequest>(&line) {
                Ok(request) => handler.handle(request).await,
                Err(e) => {
                    tracing::warn!("malformed tool request: {e}");
                    ToolResponse::fail(CODE_INVALID_INPUT, format!("malformed request: {e}"))
                }
            };
            let serialized = serde_json::to_string(&response).unwrap_or_else(|e| {
                format!(
                    "{{\"success\":false,\"error\":{{\"code\":\"internal\",\"message\":\"{e}\"}}}}"
                )
            });
            let _ = tx.send(serialized).await;
        });
    }

    while requests.join_next().await.is_some() {}
    drop(tx);
    writer_task.await?;
    Ok(())
}
