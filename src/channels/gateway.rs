use crate::bot::BotHandle;
use crate::channels::traits::InboundReply;
use crate::channels::twilio::{TwilioInboundForm, twiml_message};
use crate::config::GatewayConfig;
use crate::error::BotError;
use axum::extract::{Form, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Clone)]
struct GatewayState {
    bot: BotHandle,
    /// Force on-demand dispatches even without `?force=true`.
    force_send: bool,
}

#[derive(Debug, Default, serde::Deserialize)]
struct DispatchQuery {
    #[serde(default)]
    force: Option<bool>,
}

/// Routes served by the gateway.
pub fn router(bot: BotHandle, force_send: bool) -> Router {
    Router::new()
        .route("/health", get(gateway_health))
        .route("/status", get(status))
        .route("/dispatch", post(dispatch))
        .route("/whatsapp", post(whatsapp_inbound))
        .with_state(GatewayState { bot, force_send })
}

/// Bind `config.host:config.port` and serve until `cancel` fires.
pub async fn run_gateway(
    config: &GatewayConfig,
    bot: BotHandle,
    force_send: bool,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    serve(listener, bot, force_send, cancel).await
}

/// Serve on an already bound listener until `cancel` fires.
pub async fn serve(
    listener: tokio::net::TcpListener,
    bot: BotHandle,
    force_send: bool,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let local_addr = listener.local_addr()?;
    info!("webhook gateway listening on http://{local_addr}");
    axum::serve(listener, router(bot, force_send))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;
    info!("webhook gateway stopped");
    Ok(())
}

fn error_status(err: &BotError) -> StatusCode {
    match err {
        BotError::SendFailed(_) => StatusCode::BAD_GATEWAY,
        BotError::StateConflict { .. } => StatusCode::CONFLICT,
        BotError::Shutdown => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: &BotError) -> Response {
    (
        error_status(err),
        Json(serde_json::json!({"error": err.to_string()})),
    )
        .into_response()
}

async fn gateway_health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok"
    }))
}

async fn status(State(state): State<GatewayState>) -> Response {
    match state.bot.status().await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => {
            error!("status failed: {e}");
            error_response(&e)
        }
    }
}

async fn dispatch(
    State(state): State<GatewayState>,
    Query(query): Query<DispatchQuery>,
) -> Response {
    let request_id = Uuid::new_v4();
    let force = query.force.unwrap_or(false) || state.force_send;
    match state.bot.dispatch(force).await {
        Ok(outcome) => {
            info!(%request_id, force, "on-demand dispatch: {outcome}");
            Json(outcome).into_response()
        }
        Err(e) => {
            error!(%request_id, force, "on-demand dispatch failed: {e}");
            error_response(&e)
        }
    }
}

async fn whatsapp_inbound(
    State(state): State<GatewayState>,
    Form(form): Form<TwilioInboundForm>,
) -> Response {
    let request_id = Uuid::new_v4();
    let inbound = InboundReply::from(form);
    match state.bot.reply(inbound.text).await {
        Ok(report) => {
            info!(%request_id, sender = %inbound.sender, command = ?report.command, "reply handled");
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "application/xml")],
                twiml_message(&report.confirmation),
            )
                .into_response()
        }
        Err(e) => {
            error!(%request_id, sender = %inbound.sender, "reply failed: {e}");
            error_response(&e)
        }
    }
}
