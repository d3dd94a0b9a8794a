use std::sync::Arc;

use askama::Template;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::{Sink, SinkExt, StreamExt};
use log::{debug, error, info, warn};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::broadcast::error::RecvError;

use libs::export::{batch_report, Export};
use libs::models::{BatchRecord, Envelope};

use crate::control::{validate_humidity, validate_temperature, ControlForm, OverrideRequest};
use crate::live::LiveDashboard;
use crate::trace::{Ledger, TraceFilter};

pub const BATCH_UPDATE_EVENT: &str = "batchUpdate";
const HOUR_LABELS: [&str; 7] = ["00:00", "01:00", "02:00", "03:00", "04:00", "05:00", "06:00"];

pub struct ApiState {
    pub live: LiveDashboard,
    pub ledger: Arc<dyn Ledger>,
}

#[derive(Debug, Deserialize, Default)]
pub struct Selection {
    pub batch: Option<String>,
}

//////////
// Dashboard page
////

pub struct BatchOption {
    pub name: String,
    pub selected: &'static str,
}

pub struct SeriesPoint {
    pub label: &'static str,
    pub temperature: f64,
    pub humidity: f64,
}

#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub options: Vec<BatchOption>,
    pub batch: BatchRecord,
    pub deviation: String,
    pub trend: &'static str,
    pub points: Vec<SeriesPoint>,
}

impl DashboardTemplate {
    pub fn new(names: Vec<String>, batch: BatchRecord) -> Self {
        let options = names
            .into_iter()
            .map(|name| BatchOption {
                selected: if name == batch.name { "selected" } else { "" },
                name,
            })
            .collect();
        let points = HOUR_LABELS
            .iter()
            .zip(batch.temperature_data.iter().zip(batch.humidity_data.iter()))
            .map(|(label, (t, h))| SeriesPoint {
                label: *label,
                temperature: *t,
                humidity: *h,
            })
            .collect();
        Self {
            options,
            deviation: format!("{:.1}°", batch.current_temp - batch.optimal_temp),
            trend: if batch.current_temp > batch.optimal_temp {
                "up"
            } else {
                "down"
            },
            points,
            batch,
        }
    }
}

pub async fn dashboard(
    State(state): State<Arc<ApiState>>,
    Query(selection): Query<Selection>,
) -> Result<DashboardTemplate, StatusCode> {
    let simulator = state.live.read().await;
    let batch = simulator
        .selected(selection.batch.as_deref())
        .cloned()
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(DashboardTemplate::new(simulator.names(), batch))
}

//////////
// Live view
////

pub async fn live_view(ws: WebSocketUpgrade, State(state): State<Arc<ApiState>>) -> Response {
    ws.on_upgrade(move |socket| serve_view(socket, state))
}

/// The socket is the view: connecting activates it, any exit deactivates it.
async fn serve_view(socket: WebSocket, state: Arc<ApiState>) {
    let mut updates = state.live.updates();
    let view = match state.live.activate() {
        Ok(view) => view,
        Err(error) => {
            error!("can't activate dashboard view {}", error);
            return;
        }
    };

    let (mut sender, mut receiver) = socket.split();
    let initial = state.live.read().await.snapshot();
    if send_snapshot(&mut sender, initial).await {
        loop {
            tokio::select! {
                update = updates.recv() => {
                    match update {
                        Ok(snapshot) => {
                            if !send_snapshot(&mut sender, snapshot).await {
                                break;
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            debug!("view {} skipped {} updates", view, skipped);
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
                incoming = receiver.next() => {
                    match incoming {
                        Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                        Some(Ok(_)) => {}
                    }
                }
            }
        }
    }

    state.live.deactivate(view).await;
}

async fn send_snapshot<S>(sender: &mut S, snapshot: Vec<BatchRecord>) -> bool
where
    S: Sink<Message> + Unpin,
{
    let frame = match serde_json::to_string(&Envelope::new(BATCH_UPDATE_EVENT, snapshot)) {
        Ok(frame) => frame,
        Err(error) => {
            error!("can't encode batch update {}", error);
            return true;
        }
    };
    sender.send(Message::Text(frame)).await.is_ok()
}

//////////
// Batches & report
////

pub async fn get_batches(State(state): State<Arc<ApiState>>) -> Json<Value> {
    let batches = state.live.read().await.snapshot();
    Json(json!({ "result": batches }))
}

pub async fn get_batch(
    State(state): State<Arc<ApiState>>,
    Path(name): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let simulator = state.live.read().await;
    let batch = simulator.get(&name).ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(json!({ "result": batch })))
}

pub async fn download_report(
    State(state): State<Arc<ApiState>>,
    Query(selection): Query<Selection>,
) -> Result<Response, StatusCode> {
    let simulator = state.live.read().await;
    let batch = simulator
        .selected(selection.batch.as_deref())
        .ok_or(StatusCode::NOT_FOUND)?;
    info!("report requested for {}", batch.name);
    Ok(attachment(batch_report(&batch.name, batch)))
}

//////////
// Trace
////

pub async fn get_trace(
    State(state): State<Arc<ApiState>>,
    Query(filter): Query<TraceFilter>,
) -> Json<Value> {
    Json(json!({ "result": state.ledger.lookup(&filter) }))
}

pub async fn export_trace(
    State(state): State<Arc<ApiState>>,
    Query(filter): Query<TraceFilter>,
) -> Result<Response, StatusCode> {
    let export = state.ledger.lookup(&filter).export().map_err(|error| {
        error!("Error: {}", error);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(attachment(export))
}

//////////
// Control
////

fn rejected(errors: Value) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({ "errors": errors })),
    )
        .into_response()
}

pub async fn submit_control(Json(form): Json<ControlForm>) -> Response {
    match form.validate() {
        Ok(settings) => {
            info!("settings applied {:?}", settings);
            Json(json!({ "result": settings })).into_response()
        }
        Err(errors) => {
            debug!("control form rejected {:?}", errors);
            rejected(json!(errors))
        }
    }
}

pub async fn override_temperature(Json(request): Json<OverrideRequest>) -> Response {
    match validate_temperature(&request.value) {
        Ok(value) => {
            info!("temperature overridden to {}°C", value);
            Json(json!({ "result": { "temperature": value } })).into_response()
        }
        Err(message) => rejected(json!({ "temperature": message })),
    }
}

pub async fn adjust_humidity(Json(request): Json<OverrideRequest>) -> Response {
    match validate_humidity(&request.value) {
        Ok(value) => {
            info!("humidity adjusted to {}%", value);
            Json(json!({ "result": { "humidity": value } })).into_response()
        }
        Err(message) => rejected(json!({ "humidity": message })),
    }
}

pub async fn emergency_stop() -> Json<Value> {
    warn!("emergency stop triggered");
    Json(json!({ "result": "Emergency stop triggered!" }))
}

/// Hands an export to the browser's "save as".
pub fn attachment(export: Export) -> Response {
    let disposition = format!(
        "attachment; filename=\"{}\"",
        export.filename.replace('"', "")
    );
    (
        [
            (header::CONTENT_TYPE, export.content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        export.body,
    )
        .into_response()
}
