use std::sync::Arc;

use axum::{
    extract::{Path, Query, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::debug;
use uuid::Uuid;

pub const DEFAULT_PAGE_SIZE: usize = 3;
pub const STATUSES: &[&str] = &["draft", "active", "retired"];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Part {
    pub sku: String,
    pub quantity: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Widget {
    pub id: Uuid,
    pub name: String,
    pub status: String,
    pub note: Option<String>,
    pub parts: Vec<Part>,
}

#[derive(Deserialize)]
pub struct CreateWidget {
    pub name: String,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

fn default_status() -> String {
    "draft".to_string()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub slug: String,
    pub label: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub site_name: String,
    pub maintenance: bool,
}

/// Paginated list envelope in Django REST Framework's shape.
#[derive(Debug, Serialize, Deserialize)]
pub struct Page<T> {
    pub count: usize,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<usize>,
    pub page_size: Option<usize>,
    pub status: Option<String>,
}

pub struct Store {
    pub widgets: Vec<Widget>,
    pub tags: Vec<Tag>,
    pub settings: Settings,
}

impl Default for Store {
    fn default() -> Self {
        Self {
            widgets: Vec::new(),
            tags: vec![
                Tag {
                    slug: "metal".to_string(),
                    label: "Metal".to_string(),
                },
                Tag {
                    slug: "spare".to_string(),
                    label: "Spare part".to_string(),
                },
            ],
            settings: Settings {
                site_name: "Widget works".to_string(),
                maintenance: false,
            },
        }
    }
}

pub type Db = Arc<RwLock<Store>>;

#[derive(Clone)]
pub struct AppState {
    db: Db,
    token: Option<Arc<str>>,
}

type ApiError = (StatusCode, Json<Value>);

fn detail(status: StatusCode, message: &str) -> ApiError {
    (status, Json(json!({ "detail": message })))
}

fn not_found() -> ApiError {
    detail(StatusCode::NOT_FOUND, "Not found.")
}

fn invalid_choice(field: &str, value: &str) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ field: [format!("\"{value}\" is not a valid choice.")] })),
    )
}

/// Router without authentication.
pub fn app() -> Router {
    app_with_token(None)
}

/// Router that requires `Authorization: Token <token>` when `token` is set.
pub fn app_with_token(token: Option<String>) -> Router {
    let state = AppState {
        db: Arc::new(RwLock::new(Store::default())),
        token: token.map(Arc::from),
    };
    Router::new()
        .route("/widgets/", get(list_widgets).post(create_widget))
        .route(
            "/widgets/{id}/",
            get(get_widget).patch(update_widget).delete(delete_widget),
        )
        .route("/tags/", get(list_tags))
        .route("/settings/", get(get_settings).post(update_settings))
        .layer(middleware::from_fn_with_state(state.clone(), require_token))
        .with_state(state)
}

pub async fn run(listener: TcpListener, token: Option<String>) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_token(token)).await
}

async fn require_token(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(token) = &state.token {
        let expected = format!("Token {token}");
        let supplied = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok());
        if supplied != Some(expected.as_str()) {
            return detail(StatusCode::UNAUTHORIZED, "Invalid token.").into_response();
        }
    }
    next.run(request).await
}

/// Slices `items` into one page; pages past the end are empty.
pub fn paginate<T: Clone>(
    items: &[T],
    params: &ListParams,
    base_url: &str,
) -> Page<T> {
    let page = params.page.unwrap_or(1).max(1);
    let page_size = params.page_size.unwrap_or(DEFAULT_PAGE_SIZE).max(1);
    let start = (page - 1).saturating_mul(page_size);
    let results: Vec<T> = items.iter().skip(start).take(page_size).cloned().collect();

    let link = |page: usize| {
        let mut link = format!("{base_url}?page={page}&page_size={page_size}");
        if let Some(status) = &params.status {
            link.push_str(&format!("&status={status}"));
        }
        link
    };
    let has_next = start + results.len() < items.len() && !results.is_empty();
    Page {
        count: items.len(),
        next: has_next.then(|| link(page + 1)),
        previous: (page > 1).then(|| link(page - 1)),
        results,
    }
}

async fn list_widgets(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> impl IntoResponse {
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("localhost");
    let store = state.db.read().await;
    let matching: Vec<Widget> = store
        .widgets
        .iter()
        .filter(|w| params.status.as_deref().map_or(true, |s| w.status == s))
        .cloned()
        .collect();
    let page = paginate(&matching, &params, &format!("http://{host}/widgets/"));
    debug!(count = page.count, returned = page.results.len(), "listing widgets");
    ([("x-total-count", page.count.to_string())], Json(page))
}

async fn create_widget(
    State(state): State<AppState>,
    Json(input): Json<CreateWidget>,
) -> Result<(StatusCode, Json<Widget>), ApiError> {
    if !STATUSES.contains(&input.status.as_str()) {
        return Err(invalid_choice("status", &input.status));
    }
    let widget = Widget {
        id: Uuid::new_v4(),
        name: input.name,
        status: input.status,
        note: input.note,
        parts: input.parts,
    };
    state.db.write().await.widgets.push(widget.clone());
    Ok((StatusCode::CREATED, Json(widget)))
}

async fn get_widget(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Widget>, ApiError> {
    let store = state.db.read().await;
    store
        .widgets
        .iter()
        .find(|w| w.id == id)
        .cloned()
        .map(Json)
        .ok_or_else(not_found)
}

/// Partial update: absent keys are left alone, `"note": null` clears the note.
async fn update_widget(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(changes): Json<Map<String, Value>>,
) -> Result<Json<Widget>, ApiError> {
    let mut store = state.db.write().await;
    let widget = store
        .widgets
        .iter_mut()
        .find(|w| w.id == id)
        .ok_or_else(not_found)?;

    let mut updated = widget.clone();
    for (key, value) in changes {
        match (key.as_str(), value) {
            ("name", Value::String(name)) => updated.name = name,
            ("status", Value::String(status)) => {
                if !STATUSES.contains(&status.as_str()) {
                    return Err(invalid_choice("status", &status));
                }
                updated.status = status;
            }
            ("note", Value::Null) => updated.note = None,
            ("note", Value::String(note)) => updated.note = Some(note),
            ("parts", parts) => {
                updated.parts = serde_json::from_value(parts).map_err(|e| {
                    (StatusCode::BAD_REQUEST, Json(json!({ "parts": [e.to_string()] })))
                })?;
            }
            ("id", _) => {}
            (field, _) => {
                return Err((
                    StatusCode::BAD_REQUEST,
                    Json(json!({ field: ["Invalid value."] })),
                ))
            }
        }
    }
    *widget = updated.clone();
    Ok(Json(updated))
}

async fn delete_widget(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let mut store = state.db.write().await;
    let before = store.widgets.len();
    store.widgets.retain(|w| w.id != id);
    if store.widgets.len() == before {
        return Err(not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Unpaginated: the tag list is returned as a bare array.
async fn list_tags(State(state): State<AppState>) -> Json<Vec<Tag>> {
    Json(state.db.read().await.tags.clone())
}

async fn get_settings(State(state): State<AppState>) -> Json<Settings> {
    Json(state.db.read().await.settings.clone())
}

async fn update_settings(
    State(state): State<AppState>,
    Json(changes): Json<Map<String, Value>>,
) -> Result<Json<Settings>, ApiError> {
    let mut store = state.db.write().await;
    let mut settings = store.settings.clone();
    for (key, value) in changes {
        match (key.as_str(), value) {
            ("site_name", Value::String(name)) => settings.site_name = name,
            ("maintenance", Value::Bool(flag)) => settings.maintenance = flag,
            (field, _) => {
                return Err((
                    StatusCode::BAD_REQUEST,
                    Json(json!({ field: ["Invalid value."] })),
                ))
            }
        }
    }
    store.settings = settings.clone();
    Ok(Json(settings))
}
