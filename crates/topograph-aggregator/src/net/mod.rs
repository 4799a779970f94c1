pub mod links;
pub mod protocol;
pub mod uds;

pub use links::ProbeLinks;
pub use protocol::{ProbeEvent, ProbeEventKind};
pub use uds::{spawn_link, Backoff, LinkConfig};
