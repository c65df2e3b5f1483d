//! Watch-and-serve command.

use std::path::Path;

use anyhow::Result;
use kiln_pipeline::TaskTable;
use kiln_server::{DevServer, DevServerConfig};

use crate::config::Config;

/// Run the dev server against an already built output directory.
pub async fn run(root: &Path, config: &Config, port: Option<u16>, open: bool) -> Result<()> {
    let server_config = DevServerConfig {
        port: port.unwrap_or(config.server.port),
        open: open && config.server.open,
        ..config.server.clone()
    };

    tracing::info!("Starting development server on port {}", server_config.port);

    DevServer::new(server_config, super::context(root, config), TaskTable::standard())
        .start()
        .await?;

    Ok(())
}
