use anyhow::{Context, Result};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{UnixListener, UnixStream};
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use topograph_core::{ControlError, ControlOutput};

use crate::collector::Collector;
use crate::control::ControlRouter;
use crate::render::{NodeView, RenderContext, Views};

type Conn = Framed<UnixStream, LengthDelimitedCodec>;

fn default_true() -> bool {
    true
}

/// Client requests on the query socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Query {
    Views,
    Render {
        view: String,
        #[serde(default = "default_true")]
        admin_controls: bool,
    },
    Control {
        node_id: String,
        control: String,
        #[serde(default)]
        confirmation: Option<String>,
    },
    /// Streams `Rendered` replies until the client hangs up.
    Subscribe {
        view: String,
        #[serde(default = "default_true")]
        admin_controls: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum QueryReply {
    Views {
        views: Vec<String>,
    },
    Rendered {
        view: String,
        nodes: Vec<NodeView>,
        filtered: usize,
    },
    ControlResult {
        result: Result<ControlOutput, ControlError>,
    },
    Error {
        message: String,
    },
}

#[derive(Clone)]
pub struct QueryServer {
    pub views: Arc<Views>,
    pub collector: Arc<Collector>,
    pub router: Arc<ControlRouter>,
    /// Whether admin controls exist at all; a client can only narrow this.
    pub admin_controls: bool,
    pub subscribe_interval: Duration,
}

async fn send(framed: &mut Conn, reply: &QueryReply) -> Result<()> {
    framed.send(Bytes::from(serde_json::to_vec(reply)?)).await?;
    Ok(())
}

impl QueryServer {
    pub async fn run(self, sock_path: &Path) -> Result<()> {
        let listener = UnixListener::bind(sock_path)
            .with_context(|| format!("bind {}", sock_path.display()))?;
        tracing::info!(socket = %sock_path.display(), "query socket listening");

        loop {
            let (stream, _addr) = listener.accept().await?;
            let server = self.clone();
            tokio::spawn(async move {
                if let Err(err) = server.serve(stream).await {
                    tracing::warn!(error = %format!("{err:#}"), "query client ended");
                }
            });
        }
    }

    fn context(&self, admin_controls: bool) -> RenderContext {
        RenderContext {
            admin_controls: self.admin_controls && admin_controls,
        }
    }

    fn render(&self, view: &str, admin_controls: bool) -> QueryReply {
        let report = self.collector.report();
        match self
            .views
            .render_view(view, &self.context(admin_controls), &report)
        {
            Some((nodes, filtered)) => QueryReply::Rendered {
                view: view.to_string(),
                nodes,
                filtered,
            },
            None => QueryReply::Error {
                message: format!("unknown view {view:?}"),
            },
        }
    }

    async fn serve(&self, stream: UnixStream) -> Result<()> {
        let mut framed = Framed::new(stream, LengthDelimitedCodec::new());

        while let Some(frame) = framed.next().await {
            let query = match serde_json::from_slice::<Query>(&frame?) {
                Ok(query) => query,
                Err(err) => {
                    tracing::warn!(error = %err, "dropping invalid query");
                    let message = format!("invalid query: {err}");
                    send(&mut framed, &QueryReply::Error { message }).await?;
                    continue;
                }
            };
            tracing::debug!(?query, "query");

            let reply = match query {
                Query::Views => QueryReply::Views {
                    views: self.views.names(),
                },
                Query::Render {
                    view,
                    admin_controls,
                } => self.render(&view, admin_controls),
                Query::Control {
                    node_id,
                    control,
                    confirmation,
                } => QueryReply::ControlResult {
                    result: self
                        .router
                        .invoke(&node_id, &control, confirmation.as_deref())
                        .await,
                },
                Query::Subscribe {
                    view,
                    admin_controls,
                } => return self.subscribe(&mut framed, &view, admin_controls).await,
            };
            send(&mut framed, &reply).await?;
        }
        Ok(())
    }

    /// Pushes a fresh render every interval and right after each shortcut
    /// report, until the client disconnects.
    async fn subscribe(&self, framed: &mut Conn, view: &str, admin_controls: bool) -> Result<()> {
        if self.views.get(view).is_none() {
            let message = format!("unknown view {view:?}");
            return send(framed, &QueryReply::Error { message }).await;
        }
        let mut shortcuts = self.collector.shortcuts();
        let mut ticker = tokio::time::interval(self.subscribe_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shortcuts.changed() => {
                    if changed.is_err() {
                        return Ok(());
                    }
                    ticker.reset();
                }
                incoming = framed.next() => {
                    if incoming.is_none() {
                        return Ok(());
                    }
                    // Anything else sent on a subscription is ignored
                    continue;
                }
            }
            send(framed, &self.render(view, admin_controls)).await?;
        }
    }
}
