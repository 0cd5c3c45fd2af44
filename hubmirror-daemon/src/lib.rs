//! Sync trigger daemon: Unix socket server, bounded sync processor, log
//! rotation.

mod error;
pub mod log_rotation;
pub mod paths;
pub mod protocol;
mod runtime;

pub use error::DaemonError;
pub use protocol::{
    request_status, request_stop, request_sync, send_request, DaemonClient, DaemonRequest,
    DaemonResponse,
};
pub use runtime::{run, serve, start_blocking, DaemonState, SyncRunner, SyncTimestamps};
