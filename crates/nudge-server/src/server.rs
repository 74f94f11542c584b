use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use nudge_notifications::{
    NotificationGateway, PushSubscriptionRegistry, ReminderScheduler, WebPushAdapter,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{config::AppConfig, handlers};

/// Process-wide services shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<PushSubscriptionRegistry>,
    pub scheduler: ReminderScheduler,
}

impl AppState {
    /// Reminders fire through the in-process registry.
    pub fn new(registry: Arc<PushSubscriptionRegistry>) -> Self {
        let gateway = Arc::new(NotificationGateway::push_only(registry.clone()));
        Self {
            registry,
            scheduler: ReminderScheduler::new(gateway),
        }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        let push = &cfg.push;
        if push.is_partial() {
            tracing::warn!("Incomplete VAPID configuration, push notifications disabled");
        }
        let credentials = push.credentials();
        match credentials {
            Some(ref c) => tracing::info!(subject = %c.subject(), "Push notifications enabled"),
            None => tracing::info!("Push notifications not configured"),
        }

        let sender = Arc::new(WebPushAdapter::with_ttl(push.ttl_seconds));
        let registry = PushSubscriptionRegistry::new(credentials, sender)
            .with_template(push.template());
        Self::new(Arc::new(registry))
    }
}

pub struct NudgeServer {
    addr: SocketAddr,
    app: Router,
    state: AppState,
}

pub fn build_app(state: AppState, cfg: &AppConfig) -> Router {
    let body_limit = cfg.server.body_limit_bytes;
    Router::new()
        .route("/healthz", get(handlers::healthz))
        // Push server actions
        .route("/api/push/vapid-public-key", get(handlers::vapid_public_key))
        .route("/api/push/subscribe", post(handlers::subscribe))
        .route("/api/push/unsubscribe", post(handlers::unsubscribe))
        .route("/api/push/send", post(handlers::send))
        // Reminders
        .route(
            "/api/reminders",
            get(handlers::list_reminders)
                .post(handlers::create_reminder)
                .delete(handlers::cancel_all_reminders),
        )
        .route(
            "/api/reminders/{id}",
            get(handlers::get_reminder).delete(handlers::cancel_reminder),
        )
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(|req: &axum::http::Request<_>| {
                            use tracing::field::Empty;
                            tracing::info_span!(
                                "http.request",
                                http.method = %req.method(),
                                http.target = %req.uri(),
                                http.status_code = Empty,
                            )
                        })
                        .on_response(
                            |res: &axum::http::Response<_>,
                             latency: std::time::Duration,
                             span: &tracing::Span| {
                                span.record(
                                    "http.status_code",
                                    tracing::field::display(res.status().as_u16()),
                                );
                                tracing::info!(
                                    http.status = %res.status().as_u16(),
                                    elapsed_ms = %latency.as_millis(),
                                    "request handled"
                                );
                            },
                        ),
                )
                .layer(CorsLayer::permissive()),
        )
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    pub fn build(self) -> NudgeServer {
        let state = AppState::from_config(&self.config);
        let app = build_app(state.clone(), &self.config);

        NudgeServer {
            addr: self.addr,
            app,
            state,
        }
    }
}

impl NudgeServer {
    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        self.state.scheduler.shutdown();
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
