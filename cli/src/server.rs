//! HTTP request handlers for the Wayfarer REST API.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use wayfarer_core::catalog::Catalog;
use wayfarer_core::character::Character;
use wayfarer_core::database::Database;
use wayfarer_core::models::AuditEntry;
use wayfarer_core::optimizer::{GearOptimizer, OptimizerOptions, Target};
use wayfarer_core::WayfarerError;

pub struct AppState {
    pub db: Database,
    pub catalog: Catalog,
}

/// Build the axum router with all routes.
fn router(state: Arc<AppState>) -> axum::Router {
    use axum::routing::{delete, get, post, put};
    use tower_http::cors::CorsLayer;
    use tower_http::trace::TraceLayer;

    axum::Router::new()
        .route("/api/session/{uuid}", get(get_session).patch(patch_session))
        .route("/api/session/{uuid}/character", put(put_character))
        .route(
            "/api/session/{uuid}/gear-sets",
            get(list_gear_sets).post(create_gear_set),
        )
        .route(
            "/api/session/{uuid}/gear-sets/{id}",
            put(update_gear_set).delete(delete_gear_set),
        )
        .route("/api/session/{uuid}/optimize", post(optimize))
        .route("/api/session/{uuid}/bug-reports", post(create_bug_report))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(state: AppState, host: &str, port: u16) -> anyhow::Result<()> {
    let app = router(Arc::new(state));
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

/// Map library errors to HTTP responses. Client-caused failures keep
/// their message; everything else collapses to a generic 500.
fn api_error(err: WayfarerError) -> ApiError {
    let (status, message) = match &err {
        WayfarerError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        WayfarerError::DuplicateEntry(_) => (StatusCode::CONFLICT, err.to_string()),
        WayfarerError::Validation(_) | WayfarerError::Decode(_) | WayfarerError::Parse(_) => {
            (StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
        }
        _ => {
            tracing::error!("Internal error: {}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
            )
        }
    };
    (status, Json(ErrorBody { error: message }))
}

/// Record the request in the audit log. Audit failures are logged and
/// swallowed so they never fail the request itself.
fn audit(
    state: &AppState,
    session_uuid: &str,
    endpoint: &str,
    method: &str,
    headers: &HeaderMap,
    addr: Option<&SocketAddr>,
) {
    let entry = AuditEntry {
        session_uuid: session_uuid.to_string(),
        endpoint: endpoint.to_string(),
        method: method.to_string(),
        user_agent: headers
            .get("user-agent")
            .and_then(|v| v.to_str().ok())
            .map(String::from),
        ip_address: addr.map(|a| a.ip().to_string()),
    };
    if let Err(e) = state.db.record_access(&entry) {
        tracing::warn!("Failed to record audit entry: {}", e);
    }
}

// -- sessions --

async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(uuid): Path<String>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    audit(
        &state,
        &uuid,
        &format!("/api/session/{}", uuid),
        "GET",
        &headers,
        Some(&addr),
    );
    let session = state.db.get_or_create_session(&uuid).map_err(api_error)?;
    Ok(Json(serde_json::json!({
        "uuid": session.uuid,
        "character_config": session.character_config,
        "ui_config": session.ui_config,
        "last_updated": session.last_updated,
    })))
}

#[derive(Deserialize)]
struct ConfigUpdate {
    path: String,
    value: Value,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PatchBody {
    One(ConfigUpdate),
    Many(Vec<ConfigUpdate>),
}

/// Apply one or more dot-path updates to the session's stored config.
async fn patch_session(
    State(state): State<Arc<AppState>>,
    Path(uuid): Path<String>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(body): Json<PatchBody>,
) -> Result<Json<Value>, ApiError> {
    audit(
        &state,
        &uuid,
        &format!("/api/session/{}", uuid),
        "PATCH",
        &headers,
        Some(&addr),
    );
    let updates = match body {
        PatchBody::One(update) => vec![update],
        PatchBody::Many(updates) => updates,
    };
    let mut session = state.db.get_or_create_session(&uuid).map_err(api_error)?;
    for update in updates {
        session = state
            .db
            .update_config_path(&uuid, &update.path, update.value)
            .map_err(api_error)?;
    }
    Ok(Json(serde_json::json!({
        "uuid": session.uuid,
        "last_updated": session.last_updated,
    })))
}

/// Replace the session's character config wholesale, as sent by the
/// in-game export importer.
async fn put_character(
    State(state): State<Arc<AppState>>,
    Path(uuid): Path<String>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(config): Json<Value>,
) -> Result<StatusCode, ApiError> {
    audit(
        &state,
        &uuid,
        &format!("/api/session/{}/character", uuid),
        "PUT",
        &headers,
        Some(&addr),
    );
    state
        .db
        .set_character_config(&uuid, &config)
        .map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

// -- gear sets --

async fn list_gear_sets(
    State(state): State<Arc<AppState>>,
    Path(uuid): Path<String>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    audit(
        &state,
        &uuid,
        &format!("/api/session/{}/gear-sets", uuid),
        "GET",
        &headers,
        Some(&addr),
    );
    let sets = state.db.list_gear_sets(&uuid).map_err(api_error)?;
    Ok(Json(serde_json::json!({ "gear_sets": sets })))
}

#[derive(Deserialize)]
struct GearSetBody {
    name: String,
    #[serde(default)]
    slots: Value,
    #[serde(default)]
    export_string: Option<String>,
    #[serde(default)]
    is_optimized: bool,
}

async fn create_gear_set(
    State(state): State<Arc<AppState>>,
    Path(uuid): Path<String>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(body): Json<GearSetBody>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    audit(
        &state,
        &uuid,
        &format!("/api/session/{}/gear-sets", uuid),
        "POST",
        &headers,
        Some(&addr),
    );
    let record = state
        .db
        .create_gear_set(
            &uuid,
            &body.name,
            &body.slots,
            body.export_string.as_deref(),
            body.is_optimized,
        )
        .map_err(api_error)?;
    Ok((StatusCode::CREATED, Json(serde_json::to_value(record).unwrap_or(Value::Null))))
}

#[derive(Deserialize)]
struct GearSetUpdateBody {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    slots: Option<Value>,
    #[serde(default)]
    export_string: Option<String>,
}

async fn update_gear_set(
    State(state): State<Arc<AppState>>,
    Path((uuid, id)): Path<(String, String)>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(body): Json<GearSetUpdateBody>,
) -> Result<Json<Value>, ApiError> {
    audit(
        &state,
        &uuid,
        &format!("/api/session/{}/gear-sets/{}", uuid, id),
        "PUT",
        &headers,
        Some(&addr),
    );
    // The id must belong to the session in the URL.
    match state.db.get_gear_set(&id).map_err(api_error)? {
        Some(record) if record.session_uuid == uuid => {}
        _ => {
            return Err(api_error(WayfarerError::NotFound(format!(
                "gear set '{}'",
                id
            ))))
        }
    }
    let record = state
        .db
        .update_gear_set(
            &id,
            body.name.as_deref(),
            body.slots.as_ref(),
            body.export_string.as_deref(),
        )
        .map_err(api_error)?;
    Ok(Json(serde_json::to_value(record).unwrap_or(Value::Null)))
}

async fn delete_gear_set(
    State(state): State<Arc<AppState>>,
    Path((uuid, id)): Path<(String, String)>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    audit(
        &state,
        &uuid,
        &format!("/api/session/{}/gear-sets/{}", uuid, id),
        "DELETE",
        &headers,
        Some(&addr),
    );
    match state.db.get_gear_set(&id).map_err(api_error)? {
        Some(record) if record.session_uuid == uuid => {}
        _ => {
            return Err(api_error(WayfarerError::NotFound(format!(
                "gear set '{}'",
                id
            ))))
        }
    }
    state.db.delete_gear_set(&id).map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

// -- optimizer --

#[derive(Deserialize)]
struct OptimizeBody {
    #[serde(default)]
    activity: Option<String>,
    #[serde(default)]
    recipe: Option<String>,
    /// Store the result as a gear set under this name.
    #[serde(default)]
    save_as: Option<String>,
    #[serde(default)]
    options: Option<OptimizerOptions>,
}

/// Run the optimizer against the session's stored character, for either
/// an activity or a crafting recipe. Heavy work runs on a blocking
/// thread so the handler pool stays free.
async fn optimize(
    State(state): State<Arc<AppState>>,
    Path(uuid): Path<String>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(body): Json<OptimizeBody>,
) -> Result<Json<Value>, ApiError> {
    audit(
        &state,
        &uuid,
        &format!("/api/session/{}/optimize", uuid),
        "POST",
        &headers,
        Some(&addr),
    );
    let session = state.db.get_or_create_session(&uuid).map_err(api_error)?;
    let character: Character = serde_json::from_value(session.character_config)
        .map_err(|e| api_error(WayfarerError::Validation(format!("character config: {}", e))))?;

    let save_as = body.save_as.clone();
    let state_ref = Arc::clone(&state);
    let result = tokio::task::spawn_blocking(move || {
        let target = match (body.activity.as_deref(), body.recipe.as_deref()) {
            (Some(name), None) => Target::Activity(state_ref.catalog.activity(name)?),
            (None, Some(name)) => Target::Recipe(state_ref.catalog.recipe(name)?),
            _ => {
                return Err(WayfarerError::Validation(
                    "exactly one of 'activity' or 'recipe' is required".to_string(),
                ))
            }
        };
        let optimizer = GearOptimizer::new(
            &state_ref.catalog,
            &character,
            target,
            body.options.unwrap_or_default(),
        )?;
        optimizer.optimize()
    })
    .await
    .map_err(|e| api_error(WayfarerError::Validation(format!("optimizer task: {}", e))))?
    .map_err(api_error)?;

    let export = wayfarer_core::encode_gearset(&result.gearset).map_err(api_error)?;

    let saved = match save_as {
        Some(name) => {
            let slots = serde_json::to_value(&result.gearset).map_err(|e| {
                api_error(WayfarerError::Validation(format!("gearset encode: {}", e)))
            })?;
            let record = state
                .db
                .save_gear_set(&uuid, None, &name, &slots, Some(&export), true)
                .map_err(api_error)?;
            Some(record.id)
        }
        None => None,
    };

    Ok(Json(serde_json::json!({
        "gearset": result.gearset,
        "export_string": export,
        "metrics": result.metrics,
        "stats": result.stats.0,
        "iterations": result.iterations,
        "saved_gear_set_id": saved,
    })))
}

// -- bug reports --

#[derive(Deserialize)]
struct BugReportBody {
    description: String,
    #[serde(default)]
    app_version: Option<String>,
    #[serde(default)]
    browser_info: Option<String>,
    #[serde(default)]
    screenshots: Vec<String>,
}

async fn create_bug_report(
    State(state): State<Arc<AppState>>,
    Path(uuid): Path<String>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(body): Json<BugReportBody>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    audit(
        &state,
        &uuid,
        &format!("/api/session/{}/bug-reports", uuid),
        "POST",
        &headers,
        Some(&addr),
    );
    if body.description.trim().is_empty() {
        return Err(api_error(WayfarerError::Validation(
            "description must not be empty".to_string(),
        )));
    }
    let report = state
        .db
        .create_bug_report(
            &uuid,
            &body.description,
            body.app_version.as_deref(),
            body.browser_info.as_deref(),
            &body.screenshots,
        )
        .map_err(api_error)?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "id": report.id })),
    ))
}
