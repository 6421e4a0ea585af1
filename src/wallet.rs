use crate::error::WalletError;
use crate::types::{RpcRequest, RpcResponse, WalletConfig};
use parking_lot::RwLock;
use serde_json::{Value, json};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::time;

const MAX_CONSECUTIVE_FAILURES: usize = 3;
const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(10);
// Signing waits on the wallet owner, so this is generous.
const REQ_TIMEOUT: Duration = Duration::from_secs(30);

/// What the executor needs from a connected wallet.
pub trait WalletConnector: Send + Sync {
    /// Asks the wallet to expose its accounts; returns the selected one.
    fn connect(&self) -> impl Future<Output = Result<Option<String>, WalletError>> + Send;

    fn current_address(&self) -> impl Future<Output = Result<Option<String>, WalletError>> + Send;

    fn current_chain(&self) -> impl Future<Output = Result<u64, WalletError>> + Send;

    fn switch_chain(&self, chain_id: u64) -> impl Future<Output = Result<(), WalletError>> + Send;

    /// Sends an arbitrary JSON-RPC request and returns its `result`.
    fn request(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> impl Future<Output = Result<Value, WalletError>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeCondition {
    Healthy,
    Unhealthy,
}

impl NodeCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeCondition::Healthy => "HEALTHY",
            NodeCondition::Unhealthy => "UNHEALTHY",
        }
    }
}

/// A wallet reachable over HTTP JSON-RPC with circuit breaker health tracking.
pub struct WalletNode {
    pub config: WalletConfig,
    status: RwLock<NodeState>,
    consecutive_failures: AtomicUsize,
    next_id: AtomicU64,
    client: reqwest::Client,
}

#[derive(Debug, Clone)]
struct NodeState {
    health_status: NodeCondition,
    last_failure_time: Option<Instant>,
}

impl WalletNode {
    pub fn new(config: WalletConfig) -> Result<Self, WalletError> {
        let client = reqwest::Client::builder()
            .timeout(REQ_TIMEOUT)
            .build()
            .map_err(|e| WalletError::Transport(e.to_string()))?;

        Ok(Self {
            config,
            status: RwLock::new(NodeState {
                health_status: NodeCondition::Healthy,
                last_failure_time: None,
            }),
            consecutive_failures: AtomicUsize::new(0),
            next_id: AtomicU64::new(1),
            client,
        })
    }

    pub fn get_name(&self) -> &str {
        &self.config.name
    }

    pub fn get_status(&self) -> NodeCondition {
        self.status.read().health_status
    }

    /// How long the node has been marked unhealthy, if it is.
    pub fn unhealthy_for(&self) -> Option<Duration> {
        self.status
            .read()
            .last_failure_time
            .map(|since| Instant::now().duration_since(since))
    }

    /// Perform a health check by calling eth_chainId
    pub async fn check_health(&self) -> bool {
        self.current_chain().await.is_ok()
    }

    pub fn start_health_checker(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut interval = time::interval(HEALTH_CHECK_INTERVAL);

            loop {
                interval.tick().await;

                let is_healthy = self.check_health().await;
                tracing::debug!(
                    "Health check result for {}: {}",
                    self.get_name(),
                    if is_healthy { "HEALTHY" } else { "UNHEALTHY" }
                );
            }
        });
    }

    async fn call_rpc(&self, method: &str, params: Value) -> Result<Value, WalletError> {
        let request = RpcRequest::new(self.next_id.fetch_add(1, Ordering::SeqCst), method, params);
        tracing::debug!("Calling wallet {}: method={}", self.config.name, method);

        match self.call_rpc_internal(&request).await {
            Ok(result) => {
                self.mark_success();
                Ok(result)
            }
            // The wallet answered; a refusal is not a health problem.
            Err(e @ WalletError::Rpc { .. }) => {
                self.mark_success();
                Err(e)
            }
            Err(e) => {
                self.mark_failure();
                Err(e)
            }
        }
    }

    async fn call_rpc_internal(&self, request: &RpcRequest) -> Result<Value, WalletError> {
        let response = self
            .client
            .post(&self.config.url)
            .json(request)
            .send()
            .await
            .map_err(|e| WalletError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(WalletError::Http(response.status()));
        }

        let rpc_response: RpcResponse = response
            .json()
            .await
            .map_err(|e| WalletError::Decode(e.to_string()))?;

        if let Some(error) = rpc_response.error {
            return Err(WalletError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        Ok(rpc_response.result.unwrap_or(Value::Null))
    }

    fn mark_success(&self) {
        self.consecutive_failures.swap(0, Ordering::SeqCst);
        let mut state = self.status.write();
        if state.health_status == NodeCondition::Unhealthy {
            tracing::info!("Wallet {} is healthy again", self.config.name);
            state.health_status = NodeCondition::Healthy;
            state.last_failure_time = None;
        }
    }

    fn mark_failure(&self) {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;

        if failures >= MAX_CONSECUTIVE_FAILURES {
            let mut state = self.status.write();
            if state.health_status == NodeCondition::Healthy {
                tracing::warn!(
                    "Wallet {} marked unhealthy after {} failures",
                    self.config.name,
                    failures
                );
                state.health_status = NodeCondition::Unhealthy;
                state.last_failure_time = Some(Instant::now());
            }
        }
    }
}

fn first_account(method: &'static str, value: Value) -> Result<Option<String>, WalletError> {
    match value {
        Value::Array(accounts) => match accounts.into_iter().next() {
            None => Ok(None),
            Some(Value::String(address)) => Ok(Some(address)),
            Some(other) => Err(WalletError::UnexpectedResult { method, value: other }),
        },
        Value::Null => Ok(None),
        other => Err(WalletError::UnexpectedResult { method, value: other }),
    }
}

pub fn parse_hex_quantity(value: &str) -> Option<u64> {
    let digits = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X"))?;
    u64::from_str_radix(digits, 16).ok()
}

impl WalletConnector for WalletNode {
    async fn connect(&self) -> Result<Option<String>, WalletError> {
        let accounts = self.call_rpc("eth_requestAccounts", json!([])).await?;
        first_account("eth_requestAccounts", accounts)
    }

    async fn current_address(&self) -> Result<Option<String>, WalletError> {
        let accounts = self.call_rpc("eth_accounts", json!([])).await?;
        first_account("eth_accounts", accounts)
    }

    async fn current_chain(&self) -> Result<u64, WalletError> {
        let value = self.call_rpc("eth_chainId", json!([])).await?;
        value
            .as_str()
            .and_then(parse_hex_quantity)
            .ok_or(WalletError::UnexpectedResult {
                method: "eth_chainId",
                value,
            })
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<(), WalletError> {
        self.call_rpc(
            "wallet_switchEthereumChain",
            json!([{ "chainId": format!("0x{chain_id:x}") }]),
        )
        .await?;
        Ok(())
    }

    async fn request(&self, method: &str, params: Vec<Value>) -> Result<Value, WalletError> {
        self.call_rpc(method, Value::Array(params)).await
    }
}
