//! File delivery over the rdeploy wire protocol
//!
//! This module provides:
//! - Wire names: paths relative to the deployment root
//! - Payload selection: gzip or raw, whichever is smaller
//! - Records and frames: base64 JSON behind a little-endian length prefix
//! - Host specifiers: `host[:port]` with configurable defaults
//! - The delivery engine: one connection per host, hosts in sequence
//!
//! The protocol has no response, authentication or encryption. A receiver
//! reads one frame per connection.

mod compress;
mod engine;
mod frame;
mod host;
mod path;
mod record;

pub use compress::{SelectedPayload, select_payload};
pub use engine::{
    BeforeDeployCallback, CompletedCallback, DeliveryReport, DeployContext, DeployHooks,
    HostDeliveryOutcome, PreparedFile, RemoteDeployer,
};
pub use frame::{Frame, HEADER_LEN, read_frame};
pub use host::{DEFAULT_HOST, DEFAULT_PORT, HostAddress};
pub use path::relative_name;
pub use record::RemoteFileRecord;
