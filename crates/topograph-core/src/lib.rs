pub mod report;

pub use report::*;

use serde::{Deserialize, Serialize};

/// Bumped whenever a `Msg` variant changes shape.
pub const PROTOCOL_VERSION: &str = "1";

/// Frames exchanged between a probe and the aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Msg {
    Hello {
        version: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        probe_id: Option<String>,
    },
    Report {
        report: Report,
    },
    ControlRequest {
        request: ControlRequest,
    },
    ControlReply {
        request_id: String,
        reply: ControlReply,
    },
    Ping,
    Pong,
}

impl Msg {
    pub fn hello(probe_id: Option<String>) -> Self {
        Msg::Hello {
            version: PROTOCOL_VERSION.to_string(),
            probe_id,
        }
    }
}
