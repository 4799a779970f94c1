use anyhow::{Context, Result};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use std::path::Path;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use topograph_core::Msg;

use crate::control;
use crate::reporter::Reporter;

type Conn = Framed<UnixStream, LengthDelimitedCodec>;

async fn send(framed: &mut Conn, msg: &Msg) -> Result<()> {
    framed.send(Bytes::from(serde_json::to_vec(msg)?)).await?;
    Ok(())
}

pub async fn run(sock_path: &Path, reporter: Reporter) -> Result<()> {
    let listener = UnixListener::bind(sock_path)
        .with_context(|| format!("bind {}", sock_path.display()))?;
    tracing::info!(socket = %sock_path.display(), probe_id = reporter.probe_id(), "probe listening");

    loop {
        let (stream, _addr) = listener.accept().await?;
        let reporter = reporter.clone();
        tokio::spawn(async move {
            if let Err(err) = serve(stream, reporter).await {
                tracing::warn!(error = %format!("{err:#}"), "aggregator connection ended");
            }
        });
    }
}

async fn serve(stream: UnixStream, reporter: Reporter) -> Result<()> {
    let mut framed = Framed::new(stream, LengthDelimitedCodec::new());

    // Expect Hello first
    let Some(first) = framed.next().await else {
        return Ok(());
    };
    match serde_json::from_slice::<Msg>(&first?)? {
        Msg::Hello { version, .. } => {
            tracing::info!(%version, "aggregator connected");
        }
        other => anyhow::bail!("expected Hello, got {other:?}"),
    }

    // Subscribe before the first report so nothing published meanwhile is lost
    let mut reports = reporter.subscribe();
    send(&mut framed, &Msg::hello(Some(reporter.probe_id().to_string()))).await?;
    let report = reporter.report(false).await;
    send(&mut framed, &Msg::Report { report }).await?;

    loop {
        tokio::select! {
            published = reports.recv() => match published {
                Ok(msg) => send(&mut framed, &msg).await?,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "aggregator lagging; reports dropped");
                }
                Err(RecvError::Closed) => return Ok(()),
            },
            incoming = framed.next() => {
                let Some(bytes) = incoming else {
                    tracing::info!("aggregator disconnected");
                    return Ok(());
                };
                match serde_json::from_slice::<Msg>(&bytes?) {
                    Ok(Msg::ControlRequest { request }) => {
                        let reply = control::handle(&reporter, &request).await;
                        send(&mut framed, &Msg::ControlReply { request_id: request.request_id, reply }).await?;
                    }
                    Ok(Msg::Ping) => send(&mut framed, &Msg::Pong).await?,
                    Ok(other) => tracing::debug!(msg = ?std::mem::discriminant(&other), "ignoring message"),
                    Err(err) => tracing::warn!(error = %err, "dropping undecodable frame"),
                }
            }
        }
    }
}
