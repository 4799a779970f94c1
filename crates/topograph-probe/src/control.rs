use topograph_core::{ControlReply, ControlRequest};

use crate::reporter::Reporter;
use crate::resources::{DELETE_POD, DESCRIBE, GET_LOGS};

fn not_found(node_id: &str) -> ControlReply {
    ControlReply::NotFound {
        reason: format!("no resource with node id {node_id}"),
    }
}

fn not_a_pod(control: &str) -> ControlReply {
    ControlReply::Failed {
        reason: format!("{control} only applies to pods"),
    }
}

/// Runs one control against the local inventory.
pub async fn handle(reporter: &Reporter, request: &ControlRequest) -> ControlReply {
    let node_id = request.node_id.as_str();
    let reply = match request.control.as_str() {
        GET_LOGS => {
            let inventory = reporter.inventory().read().await;
            match inventory.find(node_id) {
                None => not_found(node_id),
                Some(resource) => match resource.as_pod() {
                    Some(pod) => ControlReply::Ok {
                        output: Some(pod.logs.join("\n")),
                    },
                    None => not_a_pod(GET_LOGS),
                },
            }
        }
        DESCRIBE => {
            let inventory = reporter.inventory().read().await;
            match inventory.find(node_id) {
                None => not_found(node_id),
                Some(resource) => match serde_json::to_string_pretty(resource) {
                    Ok(text) => ControlReply::Ok { output: Some(text) },
                    Err(err) => ControlReply::Failed {
                        reason: err.to_string(),
                    },
                },
            }
        }
        DELETE_POD => {
            let removed = {
                let mut inventory = reporter.inventory().write().await;
                match inventory.find(node_id).map(|r| r.as_pod().is_some()) {
                    None => Err(not_found(node_id)),
                    Some(false) => Err(not_a_pod(DELETE_POD)),
                    Some(true) => {
                        inventory.remove(node_id);
                        Ok(())
                    }
                }
            };
            match removed {
                Ok(()) => {
                    reporter.publish(true).await;
                    ControlReply::Ok { output: None }
                }
                Err(reply) => reply,
            }
        }
        other => ControlReply::Failed {
            reason: format!("unknown control {other}"),
        },
    };

    tracing::info!(
        request_id = %request.request_id,
        node_id,
        control = %request.control,
        ok = matches!(reply, ControlReply::Ok { .. }),
        "control handled"
    );
    reply
}
