//! Best-effort calldata enrichment for request previews.
//!
//! Function selectors are resolved through an OpenChain-compatible signature
//! database and verified contract ABIs through a Sourcify-compatible server.
//! Nothing here gates execution: every failure degrades to "unknown".

use crate::cache::LookupCache;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallPreview {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,

    /// Candidate text signatures for `selector`, best match first.
    pub signatures: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub abi: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct OpenChainResponse {
    ok: bool,
    result: Option<OpenChainResult>,
}

#[derive(Debug, Deserialize)]
struct OpenChainResult {
    #[serde(default)]
    function: HashMap<String, Option<Vec<OpenChainSignature>>>,
}

#[derive(Debug, Deserialize)]
struct OpenChainSignature {
    name: String,
    #[serde(default)]
    filtered: bool,
}

#[derive(Debug, Deserialize)]
struct SourcifyContract {
    abi: Option<Value>,
}

pub struct SignatureLookup {
    signature_url: String,
    abi_url: String,
    offline: bool,
    cache: LookupCache,
    client: reqwest::Client,
}

impl SignatureLookup {
    pub fn new(
        signature_url: &str,
        abi_url: &str,
        offline: bool,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(LOOKUP_TIMEOUT).build()?;

        Ok(Self {
            signature_url: signature_url.trim_end_matches('/').to_string(),
            abi_url: abi_url.trim_end_matches('/').to_string(),
            offline,
            cache: LookupCache::new(),
            client,
        })
    }

    /// Previews every call carried by a normalized transaction-like request.
    pub async fn preview(&self, method: &str, params: &[Value], chain_id: u64) -> Vec<CallPreview> {
        let mut previews = Vec::new();
        for call in calls_of(method, params) {
            previews.push(self.preview_call(call, chain_id).await);
        }
        previews
    }

    async fn preview_call(&self, call: &Value, chain_id: u64) -> CallPreview {
        let to = call.get("to").and_then(Value::as_str).map(str::to_string);
        let selector = call
            .get("data")
            .or_else(|| call.get("input"))
            .and_then(Value::as_str)
            .and_then(selector_of);

        let signatures = match &selector {
            Some(selector) => self.lookup_function(selector).await,
            None => Vec::new(),
        };
        let abi = match &to {
            Some(address) => self.fetch_abi(chain_id, address).await,
            None => None,
        };

        CallPreview {
            to,
            selector,
            signatures,
            abi,
        }
    }

    /// Candidate signatures for a `0x`-prefixed 4-byte selector.
    pub async fn lookup_function(&self, selector: &str) -> Vec<String> {
        let key = format!("fn:{selector}");
        if let Some(cached) = self.cache.get(&key) {
            return serde_json::from_value(cached).unwrap_or_default();
        }
        if self.offline {
            return Vec::new();
        }

        match self.fetch_signatures(selector).await {
            Ok(signatures) => {
                self.cache.put(key, Value::from(signatures.clone()));
                signatures
            }
            Err(e) => {
                tracing::warn!("Signature lookup for {} failed: {}", selector, e);
                Vec::new()
            }
        }
    }

    async fn fetch_signatures(&self, selector: &str) -> Result<Vec<String>, String> {
        let url = format!("{}/signature-database/v1/lookup", self.signature_url);
        let response: OpenChainResponse = self
            .client
            .get(&url)
            .query(&[("function", selector), ("filter", "true")])
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?
            .error_for_status()
            .map_err(|e| format!("HTTP error: {}", e))?
            .json()
            .await
            .map_err(|e| format!("Failed to parse response: {}", e))?;

        if !response.ok {
            return Err("signature database reported failure".to_string());
        }

        let mut candidates = response
            .result
            .and_then(|mut result| result.function.remove(selector))
            .flatten()
            .unwrap_or_default();
        // Unfiltered names are the curated ones; keep them first.
        candidates.sort_by_key(|candidate| candidate.filtered);

        Ok(candidates.into_iter().map(|c| c.name).collect())
    }

    /// Verified ABI of the contract at `address`, when one is published.
    pub async fn fetch_abi(&self, chain_id: u64, address: &str) -> Option<Value> {
        let key = format!("abi:{chain_id}:{}", address.to_ascii_lowercase());
        if let Some(cached) = self.cache.get(&key) {
            return (!cached.is_null()).then_some(cached);
        }
        if self.offline {
            return None;
        }

        let url = format!("{}/v2/contract/{chain_id}/{address}", self.abi_url);
        let response = match self.client.get(&url).query(&[("fields", "abi")]).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("ABI lookup for {} failed: {}", address, e);
                return None;
            }
        };

        let abi = if response.status().is_success() {
            match response.json::<SourcifyContract>().await {
                Ok(contract) => contract.abi,
                Err(e) => {
                    tracing::warn!("ABI lookup for {} returned garbage: {}", address, e);
                    return None;
                }
            }
        } else if response.status() == reqwest::StatusCode::NOT_FOUND {
            None
        } else {
            tracing::warn!("ABI lookup for {} failed: HTTP {}", address, response.status());
            return None;
        };

        self.cache.put(key, abi.clone().unwrap_or(Value::Null));
        abi
    }
}

/// Calls carried by a normalized request, if it is transaction-like.
fn calls_of<'a>(method: &str, params: &'a [Value]) -> Vec<&'a Value> {
    let Some(first) = params.first() else {
        return Vec::new();
    };

    match method {
        "eth_sendTransaction" => vec![first],
        "wallet_sendCalls" => first
            .get("calls")
            .and_then(Value::as_array)
            .map(|calls| calls.iter().collect())
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// Lower-cased `0x` + first four bytes of calldata.
pub fn selector_of(data: &str) -> Option<String> {
    let hex = data.strip_prefix("0x")?;
    let selector = hex.get(..8)?;
    selector
        .bytes()
        .all(|b| b.is_ascii_hexdigit())
        .then(|| format!("0x{}", selector.to_ascii_lowercase()))
}
