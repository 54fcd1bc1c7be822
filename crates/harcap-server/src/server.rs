//! `CaptureServer` — wires the capture service and browser endpoint into an
//! Axum router.

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;

use harcap_capture::CaptureService;
use harcap_cdp::DevToolsEndpoint;
use harcap_core::settings::ServerSettings;

use crate::routes;
use crate::shutdown::ShutdownCoordinator;

/// Shared state accessible from route handlers.
#[derive(Clone)]
pub struct AppState {
    /// The capture coordinator.
    pub service: Arc<CaptureService>,
    /// DevTools endpoint for target discovery.
    pub endpoint: DevToolsEndpoint,
    /// Renders the `/metrics` endpoint.
    pub metrics: PrometheusHandle,
    /// Shutdown coordinator; the status stream closes on its token.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started, for uptime reporting.
    pub start_time: Instant,
}

/// The control-surface server.
pub struct CaptureServer {
    settings: ServerSettings,
    state: AppState,
}

impl CaptureServer {
    /// Create a server over a capture service and a browser endpoint.
    pub fn new(
        settings: ServerSettings,
        service: Arc<CaptureService>,
        endpoint: DevToolsEndpoint,
        metrics: PrometheusHandle,
    ) -> Self {
        Self {
            settings,
            state: AppState {
                service,
                endpoint,
                metrics,
                shutdown: Arc::new(ShutdownCoordinator::new()),
                start_time: Instant::now(),
            },
        }
    }

    /// Build the router with all routes and middleware.
    #[must_use]
    pub fn router(&self) -> Router {
        routes::router(self.state.clone())
    }

    /// Address to bind, from settings.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.settings.host, self.settings.port)
    }

    /// The shutdown coordinator.
    #[must_use]
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.state.shutdown
    }

    /// The capture service this server fronts.
    #[must_use]
    pub fn service(&self) -> &Arc<CaptureService> {
        &self.state.service
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use crate::test_util::test_server;

    #[test]
    fn bind_addr_comes_from_settings() {
        let server = test_server(false);
        assert_eq!(server.bind_addr(), "127.0.0.1:8790");
    }

    #[test]
    fn shutdown_starts_untriggered() {
        let server = test_server(false);
        assert!(!server.shutdown().is_triggered());
    }
}
