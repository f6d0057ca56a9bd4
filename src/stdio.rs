//! Newline-delimited JSON-RPC over stdin/stdout.
//!
//! Messages are handled one at a time in arrival order. Each runs in a context
//! with no request credential, so tools fall back to the startup credential.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::context::{self, RequestContext, TransportKind};
use crate::protocol::{Dispatcher, JsonRpcResponse};

/// Serve the process's own stdin/stdout until stdin closes.
pub async fn run(dispatcher: Arc<Dispatcher>) -> anyhow::Result<()> {
    tracing::info!("Serving MCP over stdio");
    serve(
        &dispatcher,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await?;
    tracing::info!("stdin closed, shutting down");
    Ok(())
}

pub async fn serve<R, W>(dispatcher: &Dispatcher, reader: R, mut writer: W) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = match serde_json::from_str(line) {
            Ok(value) => {
                context::establish(
                    RequestContext::new(TransportKind::Stdio),
                    dispatcher.handle_value(value),
                )
                .await
            }
            Err(e) => {
                tracing::warn!(error = %e, "Unparseable stdio frame");
                Some(Dispatcher::parse_error(e.to_string()))
            }
        };

        if let Some(response) = response {
            write_frame(&mut writer, &response).await?;
        }
    }

    Ok(())
}

async fn write_frame<W>(writer: &mut W, response: &JsonRpcResponse) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut frame = serde_json::to_vec(response)?;
    frame.push(b'\n');
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters;
    use crate::config::{AdapterKind, Config};
    use crate::vendor::testing::ScriptedVendor;
    use serde_json::{json, Value};

    #[tokio::test]
    async fn test_stdio_round_trip_uses_startup_credential() {
        let mut config = Config::for_adapter(AdapterKind::Deploy);
        config.fallback_credential = Some("startup-token".into());

        let vendor = Arc::new(ScriptedVendor::new(vec![Ok(json!({ "teams": [] }))]));
        let registry = adapters::registry_for(&config, vendor.clone()).unwrap();
        let dispatcher = Dispatcher::new("test", "0.0.0", registry);

        let input = concat!(
            "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n",
            "\n",
            "{\"jsonrpc\":\"2.0\",\"method\":\"notifications/initialized\"}\n",
            "not json\n",
            "{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"tools/call\",\"params\":{\"name\":\"list_teams\",\"arguments\":{}}}\n",
        );
        let mut output = Vec::new();
        serve(&dispatcher, input.as_bytes(), &mut output).await.unwrap();

        let frames: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0]["id"], 1);
        assert_eq!(frames[1]["error"]["code"], -32700);
        assert_eq!(frames[2]["result"]["isError"], false);
        assert_eq!(frames[2]["result"]["content"][0]["text"], "No teams found.");
        assert_eq!(vendor.calls()[0].token(), "startup-token");
    }
}
