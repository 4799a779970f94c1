use topograph_core::{ControlReply, Report};

/// Something that happened on one probe connection.
#[derive(Debug, Clone)]
pub struct ProbeEvent {
    /// Endpoint name from the config.
    pub endpoint: String,
    pub kind: ProbeEventKind,
}

#[derive(Debug, Clone)]
pub enum ProbeEventKind {
    Connected { probe_id: String },
    Disconnected { probe_id: Option<String> },
    Report { probe_id: String, report: Report },
    ControlReply { request_id: String, reply: ControlReply },
    Error(String),
}

impl ProbeEvent {
    pub fn connected(endpoint: &str, probe_id: String) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            kind: ProbeEventKind::Connected { probe_id },
        }
    }

    pub fn disconnected(endpoint: &str, probe_id: Option<String>) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            kind: ProbeEventKind::Disconnected { probe_id },
        }
    }

    pub fn report(endpoint: &str, probe_id: String, report: Report) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            kind: ProbeEventKind::Report { probe_id, report },
        }
    }

    pub fn control_reply(endpoint: &str, request_id: String, reply: ControlReply) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            kind: ProbeEventKind::ControlReply { request_id, reply },
        }
    }

    pub fn error(endpoint: &str, msg: String) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            kind: ProbeEventKind::Error(msg),
        }
    }
}
