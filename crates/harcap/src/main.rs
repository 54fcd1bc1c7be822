//! # harcap
//!
//! Capture-service binary: wires the CDP channel, the capture service, and
//! the HTTP control surface together and runs until interrupted.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use harcap_capture::{CaptureService, DiskArtifactSink};
use harcap_cdp::chrome::{self, LaunchedChrome};
use harcap_cdp::{CdpChannel, DevToolsEndpoint};
use harcap_core::settings::{self, ChromeSettings, Settings};
use harcap_server::{metrics, CaptureServer};

/// Single page-load network and console capture service.
#[derive(Parser, Debug)]
#[command(name = "harcap", about = "Single page-load HAR capture service")]
struct Cli {
    /// Host to bind the control surface on.
    #[arg(long)]
    host: Option<String>,

    /// Port to bind the control surface on.
    #[arg(long)]
    port: Option<u16>,

    /// Host of the browser's DevTools endpoint.
    #[arg(long)]
    chrome_host: Option<String>,

    /// Port of the browser's DevTools endpoint.
    #[arg(long)]
    chrome_port: Option<u16>,

    /// Launch a local Chrome when the endpoint is unreachable.
    #[arg(long)]
    autolaunch: bool,

    /// Directory capture artifacts are written to.
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

impl Cli {
    /// CLI flags override file and env settings.
    fn apply(&self, settings: &mut Settings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(host) = &self.chrome_host {
            settings.chrome.debug_host.clone_from(host);
        }
        if let Some(port) = self.chrome_port {
            settings.chrome.debug_port = port;
        }
        if self.autolaunch {
            settings.chrome.autolaunch = true;
        }
        if let Some(dir) = &self.output_dir {
            settings.capture.output_dir.clone_from(dir);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Resolve a reachable DevTools endpoint, launching a local Chrome if the
/// configured one is down and autolaunch is enabled.
async fn connect_browser(
    chrome_settings: &ChromeSettings,
) -> Result<(DevToolsEndpoint, Option<LaunchedChrome>)> {
    let endpoint = DevToolsEndpoint::new(&chrome_settings.debug_host, chrome_settings.debug_port);
    if endpoint.version().await.is_ok() {
        tracing::info!(url = endpoint.base_url(), "browser endpoint reachable");
        return Ok((endpoint, None));
    }

    if !chrome_settings.autolaunch {
        anyhow::bail!(
            "browser endpoint {} is unreachable; start Chrome with --remote-debugging-port, \
             or pass --autolaunch",
            endpoint.base_url()
        );
    }

    let chrome_path = match &chrome_settings.chrome_path {
        Some(path) => path.clone(),
        None => chrome::find_chrome().context("no Chrome binary found to autolaunch")?,
    };
    tracing::info!(path = %chrome_path.display(), "launching Chrome");
    let launched = chrome::launch(&chrome_path)
        .await
        .context("failed to launch Chrome")?;

    let endpoint = DevToolsEndpoint::new("127.0.0.1", launched.debug_port());
    tracing::info!(url = endpoint.base_url(), "launched browser ready");
    Ok((endpoint, Some(launched)))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing();

    let mut settings = settings::load_settings().context("failed to load settings")?;
    args.apply(&mut settings);

    let metrics_handle = metrics::install_recorder();

    let (endpoint, launched_chrome) = connect_browser(&settings.chrome).await?;

    let channel = Arc::new(CdpChannel::new(
        endpoint.clone(),
        settings.capture.command_timeout(),
    ));
    let sink = Arc::new(DiskArtifactSink::new(settings.capture.output_dir.clone()));
    let service = CaptureService::new(channel, sink, settings.capture.clone());

    let server = CaptureServer::new(
        settings.server.clone(),
        Arc::clone(&service),
        endpoint,
        metrics_handle,
    );
    let pump = service.spawn_event_pump(server.shutdown().token());

    let listener = tokio::net::TcpListener::bind(server.bind_addr())
        .await
        .with_context(|| format!("failed to bind {}", server.bind_addr()))?;
    let addr = listener.local_addr().context("no local address")?;
    tracing::info!(%addr, output_dir = %settings.capture.output_dir.display(), "harcap listening");

    let router = server.router();
    let serve_token = server.shutdown().token();
    let serve = tokio::spawn(async move {
        let shutdown = async move { serve_token.cancelled().await };
        if let Err(error) = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
        {
            tracing::error!(%error, "server exited with error");
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    tracing::info!("shutting down");

    // Detach live sessions first so the browser is clean, then drain tasks.
    service.close_all().await;
    server.shutdown().drain(vec![pump, serve], None).await;
    if let Some(launched) = launched_chrome {
        launched.shutdown().await;
    }

    tracing::info!("shutdown complete");
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
