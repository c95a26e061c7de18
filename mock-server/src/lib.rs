use std::{collections::BTreeMap, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::{net::TcpListener, sync::RwLock};
use tracing::info;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Provisioning,
    Booting,
    Running,
    Offline,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Instance {
    pub id: u64,
    pub label: String,
    pub region: String,
    #[serde(rename = "type")]
    pub instance_type: String,
    pub status: Status,
}

/// Fields are optional so missing ones come back as field errors rather
/// than a body rejection.
#[derive(Deserialize)]
pub struct CreateInstance {
    pub label: Option<String>,
    pub region: Option<String>,
    #[serde(rename = "type")]
    pub instance_type: Option<String>,
    pub booted: Option<bool>,
}

#[derive(Deserialize)]
pub struct ListParams {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub page: u32,
    pub pages: u32,
    pub results: u32,
}

/// Runtime settings.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// GETs an instance needs after boot before it reports `running`.
    pub boot_steps: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self { boot_steps: 2 }
    }
}

impl Config {
    /// Read `BOOT_STEPS`, falling back to the default when unset or invalid.
    pub fn from_env() -> Self {
        let boot_steps = std::env::var("BOOT_STEPS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(Self::default().boot_steps);
        Self { boot_steps }
    }
}

struct Record {
    instance: Instance,
    gets_until_running: u32,
}

#[derive(Default)]
struct Db {
    next_id: u64,
    records: BTreeMap<u64, Record>,
}

#[derive(Clone)]
struct AppState {
    db: Arc<RwLock<Db>>,
    config: Config,
}

type ApiResult<T> = Result<T, (StatusCode, Json<serde_json::Value>)>;

const MIN_PAGE_SIZE: u32 = 25;
const MAX_PAGE_SIZE: u32 = 500;

pub fn app() -> Router {
    app_with(Config::default())
}

pub fn app_with(config: Config) -> Router {
    let state = AppState {
        db: Arc::new(RwLock::new(Db::default())),
        config,
    };
    Router::new()
        .route("/linode/instances", get(list_instances).post(create_instance))
        .route("/linode/instances/{id}", get(get_instance).delete(delete_instance))
        .route("/linode/instances/{id}/boot", post(boot_instance))
        .with_state(state)
}

pub async fn run(listener: TcpListener, config: Config) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(config)).await
}

fn errors(status: StatusCode, errors: Vec<serde_json::Value>) -> (StatusCode, Json<serde_json::Value>) {
    (status, Json(json!({ "errors": errors })))
}

fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    errors(StatusCode::NOT_FOUND, vec![json!({ "reason": "Not found" })])
}

fn validate(input: &CreateInstance) -> Vec<serde_json::Value> {
    let mut out = Vec::new();
    match input.label.as_deref() {
        None | Some("") => out.push(json!({ "field": "label", "reason": "Label is required." })),
        Some(label) if !(3..=64).contains(&label.len()) => out.push(
            json!({ "field": "label", "reason": "Label must be between 3 and 64 characters." }),
        ),
        Some(_) => {}
    }
    if input.region.as_deref().unwrap_or("").is_empty() {
        out.push(json!({ "field": "region", "reason": "Region is required." }));
    }
    if input.instance_type.as_deref().unwrap_or("").is_empty() {
        out.push(json!({ "field": "type", "reason": "A plan selection is required." }));
    }
    out
}

async fn list_instances(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Json<Page<Instance>> {
    let db = state.db.read().await;
    let page_size = params
        .page_size
        .unwrap_or(100)
        .clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE);
    let page = params.page.unwrap_or(1).max(1);
    let results = db.records.len() as u32;
    let pages = results.div_ceil(page_size).max(1);
    let data = db
        .records
        .values()
        .skip((page as usize - 1).saturating_mul(page_size as usize))
        .take(page_size as usize)
        .map(|r| r.instance.clone())
        .collect();
    Json(Page {
        data,
        page,
        pages,
        results,
    })
}

async fn create_instance(
    State(state): State<AppState>,
    Json(input): Json<CreateInstance>,
) -> ApiResult<Json<Instance>> {
    let problems = validate(&input);
    if !problems.is_empty() {
        return Err(errors(StatusCode::BAD_REQUEST, problems));
    }

    let mut db = state.db.write().await;
    db.next_id += 1;
    let booted = input.booted.unwrap_or(true);
    let instance = Instance {
        id: db.next_id,
        label: input.label.unwrap_or_default(),
        region: input.region.unwrap_or_default(),
        instance_type: input.instance_type.unwrap_or_default(),
        status: if booted { Status::Provisioning } else { Status::Offline },
    };
    let gets_until_running = if booted { state.config.boot_steps.max(1) } else { 0 };
    info!(id = instance.id, label = %instance.label, booted, "created instance");
    db.records.insert(
        instance.id,
        Record {
            instance: instance.clone(),
            gets_until_running,
        },
    );
    Ok(Json(instance))
}

/// Each read moves a booting instance one step closer to `running`.
async fn get_instance(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<Json<Instance>> {
    let mut db = state.db.write().await;
    let record = db.records.get_mut(&id).ok_or_else(not_found)?;
    if record.gets_until_running > 0 {
        record.gets_until_running -= 1;
        record.instance.status = if record.gets_until_running == 0 {
            Status::Running
        } else {
            Status::Booting
        };
    }
    Ok(Json(record.instance.clone()))
}

async fn boot_instance(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<Json<serde_json::Value>> {
    let mut db = state.db.write().await;
    let record = db.records.get_mut(&id).ok_or_else(not_found)?;
    if record.instance.status != Status::Offline {
        return Err(errors(
            StatusCode::BAD_REQUEST,
            vec![json!({ "reason": "Linode busy." })],
        ));
    }
    record.instance.status = Status::Booting;
    record.gets_until_running = state.config.boot_steps.max(1);
    info!(id, "booting instance");
    Ok(Json(json!({})))
}

async fn delete_instance(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<Json<serde_json::Value>> {
    let mut db = state.db.write().await;
    db.records.remove(&id).ok_or_else(not_found)?;
    info!(id, "deleted instance");
    Ok(Json(json!({})))
}
