//! Line-delimited JSON-RPC codec for the local transport.
//!
//! One JSON document per line in both directions. Blank lines are skipped.

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{trace, warn};

use crate::error::Result;
use crate::mcp::types::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RequestId};

/// Decode one line into a request.
///
/// On failure the ready-to-send parse error response is returned instead;
/// its id is `null` because none could be recovered.
pub fn decode_request(line: &str) -> std::result::Result<JsonRpcRequest, JsonRpcResponse> {
    serde_json::from_str(line).map_err(|e| {
        warn!(error = %e, "failed to parse JSON-RPC message");
        JsonRpcResponse::error(
            RequestId::Null,
            JsonRpcError::parse_error(format!("Parse error: {}", e)),
        )
    })
}

/// Encode a response as a single line, without the trailing newline
pub fn encode_response(response: &JsonRpcResponse) -> Result<String> {
    Ok(serde_json::to_string(response)?)
}

/// Reads requests from and writes responses to a duplex byte stream.
///
/// Generic over reader/writer so stdio and in-memory buffers work alike.
pub struct LineTransport<R, W> {
    reader: BufReader<R>,
    writer: W,
}

impl<R, W> LineTransport<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    /// Next non-blank line, or `None` at end of stream
    pub async fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        loop {
            line.clear();
            if self.reader.read_line(&mut line).await? == 0 {
                return Ok(None);
            }

            let trimmed = line.trim();
            if !trimmed.is_empty() {
                trace!(len = trimmed.len(), "read message");
                return Ok(Some(trimmed.to_string()));
            }
        }
    }

    /// Write one response line and flush
    pub async fn write_response(&mut self, response: &JsonRpcResponse) -> Result<()> {
        let mut line = encode_response(response)?;
        trace!(len = line.len(), "writing message");
        line.push('\n');

        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Give back the writer, e.g. to inspect buffered output
    pub fn into_writer(self) -> W {
        self.writer
    }
}
