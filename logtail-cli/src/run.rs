//! Wires configuration, optional SSH tunnel, search backend and tail loop.

use std::io::{BufWriter, IsTerminal};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use logtail_core::config::LogtailConfig;
use logtail_engine::tunnel::{remote_endpoint, tunnel_url};
use logtail_engine::{ElasticClient, SshTunnel, TailError, TailLoop, TailSettings, TunnelHandle};

use crate::error::CliError;

/// Run the tail until it fails, finishes (list-only) or Ctrl-C is pressed.
pub async fn run(config: LogtailConfig) -> Result<(), CliError> {
    let mut target = config.search_target();

    let mut tunnel = if config.tunnel.is_enabled() {
        Some(open_tunnel(&config).await?)
    } else {
        None
    };
    if let Some(handle) = &tunnel {
        target.tunnel_url = Some(tunnel_url(&config.search.url, handle.local_port()));
    }

    let client = ElasticClient::new(&target)?.with_trace_requests(config.search.trace_requests);
    info!(url = client.base_url(), pattern = %target.index_pattern, "connecting to search engine");

    let mut settings = TailSettings::from_config(&config);
    let stdout = std::io::stdout();
    settings.color = settings.color && stdout.is_terminal();

    let mut tail = TailLoop::new(
        Arc::new(client),
        &target.index_pattern,
        config.query_definition(),
        settings,
        BufWriter::new(stdout),
    )?;

    let result = tokio::select! {
        result = tail.run() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted, shutting down");
            Ok(())
        }
    };

    if let Some(handle) = tunnel.take() {
        handle.shutdown().await;
    }

    match result {
        // reader went away, e.g. `logtail | head`
        Err(TailError::Output(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
        other => other.map_err(CliError::from),
    }
}

async fn open_tunnel(config: &LogtailConfig) -> Result<TunnelHandle, CliError> {
    let remote = remote_endpoint(&config.search.url);
    let tunnel = SshTunnel::new(&config.tunnel.ssh)?
        .with_ready_timeout(Duration::from_secs(config.tunnel.ready_timeout_secs));

    let mut handle = tunnel.spawn(&remote).await?;
    if let Err(e) = handle.ready().await {
        warn!(ssh = %tunnel.target(), error = %e, "ssh tunnel did not become ready");
        handle.shutdown().await;
        return Err(e.into());
    }
    Ok(handle)
}
