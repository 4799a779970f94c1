use anyhow::{Context, Result};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use topograph_core::Msg;

use crate::net::{ProbeEvent, ProbeLinks};

type Conn = Framed<UnixStream, LengthDelimitedCodec>;

/// Outbound frames queued per probe before senders wait.
const LINK_QUEUE: usize = 32;

/// Exponential reconnect delay, reset after every successful handshake.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        let initial = initial.max(Duration::from_millis(1));
        Self {
            initial,
            max: max.max(initial),
            current: initial,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

pub struct LinkConfig {
    pub endpoint: String,
    pub sock_path: String,
    pub backoff: Backoff,
}

/// Keeps one probe connected for the life of the process.
pub fn spawn_link(
    cfg: LinkConfig,
    links: ProbeLinks,
    events: mpsc::Sender<ProbeEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let LinkConfig {
            endpoint,
            sock_path,
            mut backoff,
        } = cfg;
        loop {
            match session(&endpoint, &sock_path, &links, &events, &mut backoff).await {
                Ok(probe_id) => {
                    let _ = events.send(ProbeEvent::disconnected(&endpoint, probe_id)).await;
                }
                Err(err) => {
                    tracing::debug!(endpoint, error = %format!("{err:#}"), "probe link failed");
                    let _ = events
                        .send(ProbeEvent::error(&endpoint, format!("{err:#}")))
                        .await;
                }
            }
            if events.is_closed() {
                return;
            }
            tokio::time::sleep(backoff.next_delay()).await;
        }
    })
}

async fn send(framed: &mut Conn, msg: &Msg) -> Result<()> {
    framed.send(Bytes::from(serde_json::to_vec(msg)?)).await?;
    Ok(())
}

/// Runs one connection until it ends. Returns the probe ID if the
/// handshake completed.
async fn session(
    endpoint: &str,
    sock_path: &str,
    links: &ProbeLinks,
    events: &mpsc::Sender<ProbeEvent>,
    backoff: &mut Backoff,
) -> Result<Option<String>> {
    let stream = UnixStream::connect(sock_path)
        .await
        .with_context(|| format!("connect UDS {sock_path}"))?;
    let mut framed = Framed::new(stream, LengthDelimitedCodec::new());

    send(&mut framed, &Msg::hello(None)).await?;
    let probe_id = loop {
        let Some(frame) = framed.next().await else {
            return Ok(None);
        };
        match serde_json::from_slice::<Msg>(&frame?) {
            Ok(Msg::Hello { version, probe_id }) => {
                let probe_id = probe_id.unwrap_or_else(|| endpoint.to_string());
                tracing::info!(endpoint, probe_id = %probe_id, %version, "probe connected");
                break probe_id;
            }
            Ok(other) => anyhow::bail!("expected Hello, got {other:?}"),
            Err(err) => tracing::warn!(endpoint, error = %err, "dropping invalid frame"),
        }
    };
    backoff.reset();

    let (tx, mut outbound) = mpsc::channel::<Msg>(LINK_QUEUE);
    links.register(&probe_id, tx.clone());
    let _ = events
        .send(ProbeEvent::connected(endpoint, probe_id.clone()))
        .await;

    let result = pump(endpoint, &probe_id, &mut framed, &mut outbound, events).await;
    links.unregister(&probe_id, &tx);
    result.map(|()| Some(probe_id))
}

async fn pump(
    endpoint: &str,
    probe_id: &str,
    framed: &mut Conn,
    outbound: &mut mpsc::Receiver<Msg>,
    events: &mpsc::Sender<ProbeEvent>,
) -> Result<()> {
    loop {
        tokio::select! {
            Some(msg) = outbound.recv() => send(framed, &msg).await?,
            incoming = framed.next() => {
                let Some(frame) = incoming else {
                    tracing::info!(endpoint, probe_id, "probe disconnected");
                    return Ok(());
                };
                let event = match serde_json::from_slice::<Msg>(&frame?) {
                    Ok(Msg::Report { report }) => {
                        Some(ProbeEvent::report(endpoint, probe_id.to_string(), report))
                    }
                    Ok(Msg::ControlReply { request_id, reply }) => {
                        Some(ProbeEvent::control_reply(endpoint, request_id, reply))
                    }
                    Ok(Msg::Ping) => {
                        send(framed, &Msg::Pong).await?;
                        None
                    }
                    Ok(other) => {
                        tracing::debug!(endpoint, msg = ?std::mem::discriminant(&other), "ignoring message");
                        None
                    }
                    Err(err) => {
                        tracing::warn!(endpoint, probe_id, error = %err, "dropping invalid frame");
                        None
                    }
                };
                if let Some(event) = event {
                    if events.send(event).await.is_err() {
                        return Ok(());
                    }
                }
            }
        }
    }
}
