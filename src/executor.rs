use crate::error::{RequestError, WalletError};
use crate::normalize::normalize;
use crate::query::LinkRequest;
use crate::redirect::RedirectBuilder;
use crate::types::{NormalizedRequest, RedirectPayload, RpcRequestSpec};
use crate::wallet::WalletConnector;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    /// Validation failed; the wallet was never asked.
    Blocked(RequestError),

    Succeeded {
        result: Value,
        redirect: Option<String>,
        /// Set when the redirect could not be built.
        error: Option<String>,
    },

    Failed {
        error: String,
        redirect: Option<String>,
    },
}

/// Request shaped against whatever account the wallet currently exposes.
#[derive(Debug, Clone, PartialEq)]
pub struct Prepared {
    pub sender: Option<String>,
    pub params: NormalizedRequest,
}

pub struct Executor<W> {
    wallet: Arc<W>,
    redirects: RedirectBuilder,
}

impl<W: WalletConnector> Executor<W> {
    pub fn new(wallet: Arc<W>, redirects: RedirectBuilder) -> Self {
        Self { wallet, redirects }
    }

    pub fn wallet(&self) -> &Arc<W> {
        &self.wallet
    }

    /// Normalizes without prompting the wallet, for previews.
    pub async fn prepare(&self, spec: &RpcRequestSpec) -> Prepared {
        let sender = match self.wallet.current_address().await {
            Ok(sender) => sender,
            Err(e) => {
                tracing::debug!("No wallet address for preview: {}", e);
                None
            }
        };
        let params = normalize(&spec.method, spec.raw_params.as_ref(), sender.as_deref());
        Prepared { sender, params }
    }

    /// Runs the link's request against the wallet and works out where to go next.
    pub async fn execute(&self, link: &LinkRequest) -> ExecutionOutcome {
        let spec = &link.spec;
        let sender = self.sender().await;

        let params = match normalize(&spec.method, spec.raw_params.as_ref(), sender.as_deref()) {
            Ok(params) => params,
            Err(e) => {
                tracing::info!("Blocked {} request: {}", spec.method, e);
                return ExecutionOutcome::Blocked(e);
            }
        };

        let payload = match self.dispatch(spec, params).await {
            Ok(result) => {
                tracing::info!("Wallet executed {}", spec.method);
                RedirectPayload::Result(result)
            }
            Err(e) => {
                tracing::warn!("Wallet failed {}: {}", spec.method, e);
                RedirectPayload::Error(e.to_string())
            }
        };

        self.finish(payload, link.redirect_url.as_deref())
    }

    async fn sender(&self) -> Option<String> {
        match self.wallet.current_address().await {
            Ok(Some(address)) => return Some(address),
            Ok(None) => {}
            Err(e) => tracing::debug!("eth_accounts failed: {}", e),
        }

        match self.wallet.connect().await {
            Ok(address) => address,
            Err(e) => {
                tracing::warn!("Wallet connect failed: {}", e);
                None
            }
        }
    }

    /// The chain switch completes before the request is sent.
    async fn dispatch(&self, spec: &RpcRequestSpec, params: Vec<Value>) -> Result<Value, WalletError> {
        let current = self.wallet.current_chain().await?;
        if current != spec.chain_id {
            tracing::info!("Switching wallet chain {} -> {}", current, spec.chain_id);
            self.wallet.switch_chain(spec.chain_id).await?;
        }

        self.wallet.request(&spec.method, params).await
    }

    fn finish(&self, payload: RedirectPayload, template: Option<&str>) -> ExecutionOutcome {
        let redirect = template.map(|template| self.redirects.build(template, &payload));

        match (payload, redirect) {
            (RedirectPayload::Result(result), redirect) => {
                let (redirect, error) = match redirect {
                    None => (None, None),
                    Some(Ok(target)) => (Some(target), None),
                    Some(Err(e)) => (None, Some(format!("redirect failed: {e}"))),
                };
                ExecutionOutcome::Succeeded {
                    result,
                    redirect,
                    error,
                }
            }
            (RedirectPayload::Error(error), redirect) => match redirect {
                None => ExecutionOutcome::Failed {
                    error,
                    redirect: None,
                },
                Some(Ok(target)) => ExecutionOutcome::Failed {
                    error,
                    redirect: Some(target),
                },
                Some(Err(e)) => ExecutionOutcome::Failed {
                    error: format!("{error} (redirect failed: {e})"),
                    redirect: None,
                },
            },
        }
    }
}
