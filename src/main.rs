mod cache;
mod config;
mod error;
mod executor;
mod normalize;
mod query;
mod redirect;
mod signatures;
mod types;
mod wallet;

use axum::{
    Json, Router,
    extract::{RawQuery, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use config::Config;
use executor::{ExecutionOutcome, Executor};
use query::parse_link_query;
use redirect::RedirectBuilder;
use serde::Serialize;
use serde_json::{Value, json};
use signatures::{CallPreview, SignatureLookup};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use types::WalletConfig;
use wallet::WalletNode;

#[derive(Clone)]
struct AppState {
    executor: Arc<Executor<WalletNode>>,
    lookup: Arc<SignatureLookup>,
    supported_chains: Arc<Vec<u64>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Preview {
    method: String,
    chain_id: u64,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    redirect_url: Option<String>,
    calls: Vec<CallPreview>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rpc_link=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting rpc_link");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Wallet endpoint: {}", config.wallet_url);
    tracing::info!("Supported chains: {:?}", config.supported_chains);
    tracing::info!("Redirect origin: {}", config.origin);

    let state = match build_state(&config) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("Failed to create HTTP client: {}", e);
            std::process::exit(1);
        }
    };

    // Start background health checker
    Arc::clone(state.executor.wallet()).start_health_checker();

    let app = router(state);

    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .expect("Failed to bind listen address");

    tracing::info!("Listening on http://{}", config.listen);

    axum::serve(listener, app)
        .await
        .expect("Server failed to start");
}

fn build_state(config: &Config) -> Result<AppState, String> {
    let wallet = WalletNode::new(WalletConfig {
        name: "wallet".to_string(),
        url: config.wallet_url.clone(),
    })
    .map_err(|e| e.to_string())?;
    let lookup = SignatureLookup::new(&config.signature_url, &config.abi_url, config.offline)
        .map_err(|e| e.to_string())?;

    Ok(AppState {
        executor: Arc::new(Executor::new(
            Arc::new(wallet),
            RedirectBuilder::new(config.origin.clone()),
        )),
        lookup: Arc::new(lookup),
        supported_chains: Arc::new(config.supported_chains.clone()),
    })
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(preview_request))
        .route("/execute", post(execute_request))
        .route("/health", get(health_check))
        .route("/status", get(status_check))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

fn error_response(status: StatusCode, error: String) -> Response {
    (status, Json(json!({ "ok": false, "error": error }))).into_response()
}

/// Preview endpoint - shows what the link would ask the wallet to do
async fn preview_request(State(state): State<AppState>, RawQuery(query): RawQuery) -> Response {
    let link = match parse_link_query(query.as_deref().unwrap_or_default(), &state.supported_chains)
    {
        Ok(link) => link,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };
    tracing::info!(
        "Preview request: method={} chainId={}",
        link.spec.method,
        link.spec.chain_id
    );

    let prepared = state.executor.prepare(&link.spec).await;
    let (params, error, calls) = match prepared.params {
        Ok(params) => {
            let calls = state
                .lookup
                .preview(&link.spec.method, &params, link.spec.chain_id)
                .await;
            (Some(params), None, calls)
        }
        Err(e) => (None, Some(e.to_string()), Vec::new()),
    };

    let preview = Preview {
        method: link.spec.method,
        chain_id: link.spec.chain_id,
        ok: params.is_some(),
        params,
        error,
        from: prepared.sender,
        redirect_url: link.redirect_url,
        calls,
    };

    (StatusCode::OK, Json(preview)).into_response()
}

async fn execute_request(State(state): State<AppState>, RawQuery(query): RawQuery) -> Response {
    let link = match parse_link_query(query.as_deref().unwrap_or_default(), &state.supported_chains)
    {
        Ok(link) => link,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };
    tracing::info!(
        "Execute request: method={} chainId={}",
        link.spec.method,
        link.spec.chain_id
    );

    match state.executor.execute(&link).await {
        ExecutionOutcome::Blocked(e) => error_response(StatusCode::BAD_REQUEST, e.to_string()),
        ExecutionOutcome::Succeeded {
            redirect: Some(target),
            ..
        }
        | ExecutionOutcome::Failed {
            redirect: Some(target),
            ..
        } => {
            tracing::info!("Redirecting to {}", target);
            Redirect::to(&target).into_response()
        }
        ExecutionOutcome::Succeeded { result, error, .. } => {
            if let Some(error) = &error {
                tracing::error!("{}", error);
            }
            let mut body = json!({ "ok": true, "result": result });
            if let Some(error) = error {
                body["error"] = Value::String(error);
            }
            (StatusCode::OK, Json(body)).into_response()
        }
        ExecutionOutcome::Failed { error, .. } => error_response(StatusCode::BAD_GATEWAY, error),
    }
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Status check endpoint - returns the wallet node's health
async fn status_check(State(state): State<AppState>) -> impl IntoResponse {
    let wallet = state.executor.wallet();
    let status_json = json!({
        "wallet": {
            "name": wallet.get_name(),
            "url": wallet.config.url,
            "status": wallet.get_status().as_str(),
            "unhealthySecs": wallet.unhealthy_for().map(|d| d.as_secs()),
        },
        "chains": state.supported_chains.as_slice(),
    });

    (StatusCode::OK, Json(status_json))
}
