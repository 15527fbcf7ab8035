use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc::WeakSender;
use tracing::{error, info, warn};

/// The health server holds only a weak handle on the relay so it never keeps
/// the gateway stream open past shutdown.
#[derive(Clone)]
pub struct HealthState {
    relay: WeakSender<Value>,
    commands_registered: bool,
}

impl HealthState {
    pub fn new(relay: WeakSender<Value>, commands_registered: bool) -> Self {
        Self { relay, commands_registered }
    }

    fn relay_open(&self) -> bool {
        self.relay.upgrade().is_some_and(|sender| !sender.is_closed())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub gateway: HealthCheck,
    pub commands: HealthCheck,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/interactions", post(relay_interaction))
        .with_state(state)
}

pub async fn spawn(bind_address: &str, port: u16, state: HealthState) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(state)).await {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let gateway = if state.relay_open() {
        HealthCheck { status: "ready", detail: "interaction relay accepting events".to_string() }
    } else {
        HealthCheck { status: "degraded", detail: "interaction relay is closed".to_string() }
    };
    // Registration is best effort; a failure is reported but never fails the probe.
    let commands = if state.commands_registered {
        HealthCheck { status: "ready", detail: "slash commands registered".to_string() }
    } else {
        HealthCheck { status: "degraded", detail: "slash command registration failed".to_string() }
    };
    let ready = gateway.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck { status: "ready", detail: "faqbot runtime initialized".to_string() },
        gateway,
        commands,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

/// Accepts raw `INTERACTION_CREATE` payloads forwarded by a gateway client and
/// queues them for the gateway runner.
pub async fn relay_interaction(
    State(state): State<HealthState>,
    Json(payload): Json<Value>,
) -> StatusCode {
    let Some(sender) = state.relay.upgrade() else {
        return StatusCode::SERVICE_UNAVAILABLE;
    };
    match sender.send(payload).await {
        Ok(()) => StatusCode::ACCEPTED,
        Err(_) => {
            warn!(
                event_name = "ingress.discord.relay_closed",
                correlation_id = "relay",
                "interaction relay closed; dropping payload"
            );
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
