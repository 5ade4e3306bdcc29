//! Stdio transport - reads JSON-RPC from stdin, writes to stdout.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::protocol::{HandlerRegistry, ProtocolHandler};
use crate::types::{InitOptions, JsonRpcMessage, McpError, McpResult};

use super::{framing, TransportDriver};

/// Stdio driver for a single client process that owns our standard streams.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdioDriver;

impl StdioDriver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TransportDriver for StdioDriver {
    async fn run(self: Box<Self>, registry: Arc<HandlerRegistry>, init: InitOptions) -> McpResult<()> {
        let handler = ProtocolHandler::new(registry, init);
        let reader = BufReader::new(tokio::io::stdin());
        let writer = tokio::io::stdout();

        tracing::info!("Stdio transport started");
        serve(reader, writer, &handler).await
    }

    fn name(&self) -> &'static str {
        "stdio"
    }
}

/// Run the read → classify → dispatch → write loop until `reader` hits EOF.
///
/// One message is in flight at a time. A malformed line is answered with a
/// protocol error and the loop carries on; stream I/O failures end it.
pub async fn serve<R, W>(mut reader: R, mut writer: W, handler: &ProtocolHandler) -> McpResult<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut line = Vec::new();

    loop {
        line.clear();
        let bytes_read = reader.read_until(b'\n', &mut line).await.map_err(McpError::Io)?;

        if bytes_read == 0 {
            tracing::info!("EOF on stdin, shutting down");
            break;
        }

        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        // Invalid UTF-8 surfaces as a parse error, not a stream failure.
        let reply = match framing::parse_bytes(&line) {
            Ok(payload) => handler.handle_payload(&payload).await,
            Err(e) => {
                tracing::warn!("Parse error: {e}");
                Some(e.to_message(Default::default()))
            }
        };

        if let Some(reply) = reply {
            write_message(&mut writer, &reply).await?;
        }
    }

    Ok(())
}

async fn write_message<W: AsyncWrite + Unpin>(writer: &mut W, message: &JsonRpcMessage) -> McpResult<()> {
    let framed = framing::frame_message(message)?;
    writer
        .write_all(framed.as_bytes())
        .await
        .map_err(McpError::Io)?;
    writer.flush().await.map_err(McpError::Io)?;
    Ok(())
}
