//! Watch orchestration and live-reload development server for kiln.
//!
//! File changes are mapped to the transform tasks that must re-run, and every
//! completed re-run is pushed to connected browsers over a WebSocket.

pub mod orchestrator;
pub mod reload;
pub mod server;
pub mod watcher;

pub use orchestrator::WatchOrchestrator;
pub use reload::{ReloadHub, ReloadMessage};
pub use server::{DevServer, DevServerConfig, ServerError};
pub use watcher::{ChangeKind, FileChangeEvent, FileWatcher};
