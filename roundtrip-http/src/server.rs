//! Monitoring HTTP server

use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use minijinja::{Environment, context};
use roundtrip_common::{Signal, incoming};
use roundtrip_probe::{DetailReport, Reporter};
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;

use crate::{HttpConfig, HttpError};

const DETAILED_TEMPLATE: &str = "detailed.html";

/// Everything the handlers need.
pub struct MonitorState {
    reporter: Reporter,
    templates: Environment<'static>,
    hostname: String,
}

impl MonitorState {
    /// # Errors
    ///
    /// Returns an error if the embedded template does not parse.
    pub fn new(reporter: Reporter, hostname: String) -> Result<Self, HttpError> {
        let mut templates = Environment::new();
        templates.add_template(DETAILED_TEMPLATE, include_str!("../templates/detailed.html"))?;

        Ok(Self {
            reporter,
            templates,
            hostname,
        })
    }

    /// Render the detail page. `.html` templates are auto-escaped.
    fn render(&self, report: &DetailReport) -> Result<String, HttpError> {
        let template = self.templates.get_template(DETAILED_TEMPLATE)?;
        Ok(template.render(context! {
            hostname => &self.hostname,
            rows => &report.rows,
            average_wait => report.average_display(),
        })?)
    }
}

/// HTTP server for `/simple` and `/detailed`
pub struct MonitorServer {
    listener: TcpListener,
    router: Router,
}

impl MonitorServer {
    /// Bind the configured address
    ///
    /// # Errors
    ///
    /// Returns an error if binding to the specified address fails.
    pub async fn new(config: &HttpConfig, state: Arc<MonitorState>) -> Result<Self, HttpError> {
        let listener = TcpListener::bind(&config.listen_address)
            .await
            .map_err(|e| HttpError::BindError {
                address: config.listen_address.clone(),
                source: e,
            })?;

        tracing::info!(
            address = %config.listen_address,
            "Monitoring server bound successfully"
        );

        Ok(Self {
            listener,
            router: router(state, Duration::from_secs(config.request_timeout_secs)),
        })
    }

    /// The bound address, useful when listening on port 0.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket address cannot be read.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Run the server until a shutdown signal is received
    ///
    /// # Errors
    ///
    /// Returns an error if the server encounters a runtime error.
    pub async fn serve(
        self,
        mut shutdown: tokio::sync::broadcast::Receiver<Signal>,
    ) -> Result<(), HttpError> {
        tracing::info!("Monitoring server starting");

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Monitoring server received shutdown signal");
            })
            .await
            .map_err(|e| HttpError::ServerError(e.to_string()))?;

        tracing::info!("Monitoring server stopped");
        Ok(())
    }
}

fn router(state: Arc<MonitorState>, request_timeout: Duration) -> Router {
    Router::new()
        .route("/simple", get(simple_handler))
        .route("/detailed", get(detailed_handler))
        .with_state(state)
        .layer(TimeoutLayer::new(request_timeout))
}

/// Seconds since mail for us was last received, as `seconds:<n>`
async fn simple_handler(State(state): State<Arc<MonitorState>>) -> String {
    incoming!("GET /simple");
    format!("seconds:{}", state.reporter.liveness())
}

/// The most recent probes as an HTML table
async fn detailed_handler(State(state): State<Arc<MonitorState>>) -> Response {
    incoming!("GET /detailed");
    let report = state.reporter.detailed().await;

    match state.render(&report) {
        Ok(html) => Html(html).into_response(),
        Err(err) => {
            tracing::error!(error = %err, "Failed to render detail page");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to render page").into_response()
        }
    }
}
