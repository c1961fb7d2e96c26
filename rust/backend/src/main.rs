use std::error::Error;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{DefaultBodyLimit, Path as UrlPath, State};
use axum::http::{header, HeaderName, HeaderValue, Method, Request, StatusCode};
use axum::middleware::{from_fn_with_state, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use lpwallet_client::{
    checksummed, compute_range, get_tick_at_sqrt_ratio, network, parse_decimal_to_ratio,
    parse_decimal_u128, plan_mint, ratio_to_sqrt_price_x96, summarize_position, unix_now, Address,
    ClientError, KeyCache, MintPlan, MintRequest, Network, PasswordPrompt, PoolStateFile,
    PositionRange, PositionStatus, StaticPassword, TerminalPrompt,
};

const CONFIG_ENV: &str = "LPWALLET_BACKEND_CONFIG";
const PASSWORD_ENV: &str = "LPWALLET_KEY_PASSWORD";

#[derive(Clone)]
struct AppState {
    config: Arc<AppConfig>,
    keys: Arc<KeyCache>,
    network: Arc<Network>,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    bind_addr: String,
    key_file: Option<String>,
    network: String,
    request_timeout_secs: u64,
    max_body_bytes: usize,
    cors_allow_origins: Vec<String>,
    api_key: Option<String>,
}

#[derive(Debug, Clone)]
struct AppConfig {
    bind_addr: SocketAddr,
    key_file: Option<PathBuf>,
    network: Network,
    request_timeout: Duration,
    max_body_bytes: usize,
    cors_allow_origins: Vec<String>,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    unlocked: bool,
}

#[derive(Debug, Serialize)]
struct AddressResponse {
    #[serde(with = "checksummed")]
    address: Address,
}

#[derive(Debug, Deserialize)]
struct TickQuoteRequest {
    price: String,
}

#[derive(Debug, Serialize)]
struct TickQuoteResponse {
    ratio: String,
    sqrt_price_x96: String,
    tick: i32,
}

#[derive(Debug, Deserialize)]
struct RangeQuoteRequest {
    price_lower: String,
    price_upper: String,
    pool: PoolStateFile,
}

#[derive(Debug, Serialize)]
struct RangeQuoteResponse {
    tick_lower: i32,
    tick_upper: i32,
}

#[derive(Debug, Deserialize)]
struct MintQuoteRequest {
    request: MintRequest,
    pool: PoolStateFile,
    #[serde(default, deserialize_with = "checksummed::deserialize_option")]
    recipient: Option<Address>,
}

#[derive(Debug, Serialize)]
struct MintQuoteResponse {
    network: &'static str,
    chain_id: u64,
    #[serde(with = "checksummed")]
    position_manager: Address,
    #[serde(flatten)]
    plan: MintPlan,
}

#[derive(Debug, Deserialize)]
struct PositionStatusRequest {
    tick_lower: i32,
    tick_upper: i32,
    liquidity: String,
    pool: PoolStateFile,
}

#[derive(Debug, Serialize)]
struct PositionStatusResponse {
    status: PositionStatus,
    amount0: String,
    amount1: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    NotFound(String),
    Locked,
    Unauthorized,
    Internal(String),
}

impl From<ClientError> for ApiError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::InvalidInput(_)
            | ClientError::OutOfRange(_)
            | ClientError::InvalidSpacing(_)
            | ClientError::InvalidRange(_)
            | ClientError::AmountOverflow(_)
            | ClientError::Serde(_) => ApiError::BadRequest(err.to_string()),
            ClientError::WeakPassword
            | ClientError::FileAlreadyExists(_)
            | ClientError::FileNotFound(_)
            | ClientError::CorruptKeyFile(_)
            | ClientError::WrongPassword
            | ClientError::Crypto(_)
            | ClientError::Io(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Locked => (
                StatusCode::SERVICE_UNAVAILABLE,
                "wallet is locked".to_string(),
            ),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized".to_string()),
            ApiError::Internal(msg) => {
                error!("internal error: {msg}");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if let Err(err) = run().await {
        error!("{err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn Error>> {
    let config_path = std::env::var(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));
    let raw = load_config(&config_path)?;
    let config = finalize_config(raw, &config_path)?;

    let keys = Arc::new(KeyCache::new());
    match &config.key_file {
        Some(path) => {
            let address = unlock_at_startup(Arc::clone(&keys), path.clone()).await?;
            info!(%address, "wallet unlocked");
        }
        None => warn!("no key_file configured; wallet routes will report locked"),
    }

    let state = AppState {
        network: Arc::new(config.network.clone()),
        config: Arc::new(config.clone()),
        keys,
    };
    let app = build_router(state)?;

    info!(
        network = config.network.name,
        "lpwallet backend listening on {}", config.bind_addr
    );
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: AppState) -> Result<Router, Box<dyn Error>> {
    let cors = build_cors(&state.config.cors_allow_origins)?;
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout = state.config.request_timeout;
    Ok(Router::new()
        .route("/health", get(health))
        .route("/wallet/address", get(wallet_address))
        .route("/quote/tick", post(quote_tick))
        .route("/quote/range", post(quote_range))
        .route("/quote/mint", post(quote_mint))
        .route("/positions/status", post(position_status))
        .route("/networks/:name", get(network_info))
        .layer(from_fn_with_state(state.clone(), require_api_key))
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(cors))
}

/// Decrypts the configured key once, before the listener starts. The
/// password comes from the environment when set, else the terminal.
async fn unlock_at_startup(
    keys: Arc<KeyCache>,
    path: PathBuf,
) -> Result<Address, Box<dyn Error>> {
    let address = tokio::task::spawn_blocking(move || -> Result<Address, ClientError> {
        let prompt: Box<dyn PasswordPrompt> = match std::env::var(PASSWORD_ENV) {
            Ok(value) => Box::new(StaticPassword::new(value)),
            Err(_) => Box::new(TerminalPrompt),
        };
        keys.unlock(&path, prompt.as_ref())?.address()
    })
    .await??;
    Ok(address)
}

fn load_config(path: &Path) -> Result<RawConfig, Box<dyn Error>> {
    let contents = fs::read_to_string(path)?;
    let config: RawConfig = toml::from_str(&contents)?;
    Ok(config)
}

fn finalize_config(raw: RawConfig, config_path: &Path) -> Result<AppConfig, Box<dyn Error>> {
    let base_dir = config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let bind_addr = raw
        .bind_addr
        .parse::<SocketAddr>()
        .map_err(|e| format!("invalid bind_addr: {e}"))?;
    let network = network(raw.network.trim()).map_err(|e| format!("network: {e}"))?;
    let key_file = raw
        .key_file
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| resolve_path(&base_dir, value));

    if raw.request_timeout_secs == 0 {
        return Err("request_timeout_secs must be >= 1".into());
    }
    if raw.max_body_bytes == 0 {
        return Err("max_body_bytes must be >= 1".into());
    }
    if raw.cors_allow_origins.is_empty() {
        return Err("cors_allow_origins must not be empty".into());
    }
    let api_key = raw.api_key.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    });
    if api_key.is_none() && !is_dev_mode() {
        return Err("api_key must be set unless ENV=dev or ENV=test".into());
    }

    Ok(AppConfig {
        bind_addr,
        key_file,
        network,
        request_timeout: Duration::from_secs(raw.request_timeout_secs),
        max_body_bytes: raw.max_body_bytes,
        cors_allow_origins: raw.cors_allow_origins,
        api_key,
    })
}

fn is_dev_mode() -> bool {
    match std::env::var("ENV") {
        Ok(value) => matches!(value.as_str(), "dev" | "test"),
        Err(_) => false,
    }
}

fn resolve_path(base: &Path, value: &str) -> PathBuf {
    let path = PathBuf::from(value);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

fn build_cors(origins: &[String]) -> Result<CorsLayer, Box<dyn Error>> {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static("x-api-key")]);
    if origins.iter().any(|o| o == "*") {
        return Ok(base.allow_origin(Any));
    }
    let mut values = Vec::with_capacity(origins.len());
    for origin in origins {
        values.push(HeaderValue::from_str(origin)?);
    }
    Ok(base.allow_origin(values))
}

async fn require_api_key(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if req.method() == Method::OPTIONS || req.uri().path() == "/health" {
        return next.run(req).await;
    }
    if let Some(expected) = state.config.api_key.as_deref() {
        let provided = req
            .headers()
            .get("x-api-key")
            .and_then(|value| value.to_str().ok());
        if provided != Some(expected) {
            return ApiError::Unauthorized.into_response();
        }
    }
    next.run(req).await
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        unlocked: state.keys.is_unlocked(),
    })
}

async fn wallet_address(
    State(state): State<AppState>,
) -> Result<Json<AddressResponse>, ApiError> {
    Ok(Json(AddressResponse {
        address: unlocked_address(&state)?,
    }))
}

async fn quote_tick(
    Json(request): Json<TickQuoteRequest>,
) -> Result<Json<TickQuoteResponse>, ApiError> {
    let ratio = parse_decimal_to_ratio(&request.price)?;
    let sqrt_price = ratio_to_sqrt_price_x96(&ratio)?;
    let tick = get_tick_at_sqrt_ratio(&sqrt_price)?;
    Ok(Json(TickQuoteResponse {
        ratio: ratio.to_string(),
        sqrt_price_x96: sqrt_price.to_string(),
        tick,
    }))
}

async fn quote_range(
    Json(request): Json<RangeQuoteRequest>,
) -> Result<Json<RangeQuoteResponse>, ApiError> {
    let pool = request.pool.to_pool_state()?;
    let range = compute_range(&request.price_lower, &request.price_upper, &pool)?;
    Ok(Json(RangeQuoteResponse {
        tick_lower: range.tick_lower,
        tick_upper: range.tick_upper,
    }))
}

async fn quote_mint(
    State(state): State<AppState>,
    Json(request): Json<MintQuoteRequest>,
) -> Result<Json<MintQuoteResponse>, ApiError> {
    let pool = request.pool.to_pool_state()?;
    let recipient = match request.recipient {
        Some(recipient) => recipient,
        None => unlocked_address(&state)?,
    };
    let plan = plan_mint(&request.request, &pool, recipient, unix_now()?)?;
    Ok(Json(MintQuoteResponse {
        network: state.network.name,
        chain_id: state.network.chain_id,
        position_manager: state.network.position_manager,
        plan,
    }))
}

async fn position_status(
    Json(request): Json<PositionStatusRequest>,
) -> Result<Json<PositionStatusResponse>, ApiError> {
    let pool = request.pool.to_pool_state()?;
    let liquidity = parse_decimal_u128(&request.liquidity)?;
    let range = PositionRange {
        tick_lower: request.tick_lower,
        tick_upper: request.tick_upper,
    };
    let summary = summarize_position(&pool, &range, liquidity)?;
    Ok(Json(PositionStatusResponse {
        status: summary.status,
        amount0: summary.amount0.to_string(),
        amount1: summary.amount1.to_string(),
    }))
}

async fn network_info(UrlPath(name): UrlPath<String>) -> Result<Json<Network>, ApiError> {
    network(&name)
        .map(Json)
        .map_err(|e| ApiError::NotFound(e.to_string()))
}

fn unlocked_address(state: &AppState) -> Result<Address, ApiError> {
    let key = state.keys.get().ok_or(ApiError::Locked)?;
    Ok(key.address()?)
}
