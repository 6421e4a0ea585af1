//! Parsing of the link's query string.
//!
//! Links are produced by many different tools and JSON values frequently arrive
//! percent-encoded more than once. Decoding here tolerates up to two extra layers.

use crate::error::RequestError;
use crate::types::RpcRequestSpec;
use percent_encoding::percent_decode_str;
use serde_json::Value;
use url::form_urlencoded;

/// Everything the link carries.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkRequest {
    pub spec: RpcRequestSpec,
    pub redirect_url: Option<String>,
}

/// Strict `decodeURIComponent`: malformed escapes or invalid UTF-8 fail.
pub fn decode_component(input: &str) -> Option<String> {
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes.len() > i + 2
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit();
            if !valid {
                return None;
            }
            i += 3;
        } else {
            i += 1;
        }
    }

    percent_decode_str(input)
        .decode_utf8()
        .ok()
        .map(|decoded| decoded.into_owned())
}

/// Recovers a JSON value from a `params` query value encoded zero, one or two times.
///
/// Candidates are tried in order (raw, decoded once, decoded twice) so JSON that
/// is already well formed is never reinterpreted.
pub fn decode_json_param(raw: &str) -> Option<Value> {
    let mut candidates = vec![raw.to_string()];
    if raw.contains('%') {
        if let Some(once) = decode_component(raw) {
            let twice = decode_component(&once);
            candidates.push(once);
            candidates.extend(twice);
        }
    }

    candidates
        .iter()
        .find_map(|candidate| serde_json::from_str(candidate).ok())
}

/// Normalizes a `redirect_url` value. `None` means no redirect was requested.
pub fn decode_redirect_template(raw: &str) -> Option<String> {
    let mut current = raw.to_string();
    for _ in 0..2 {
        match decode_component(&current) {
            Some(decoded) if decoded != current => current = decoded,
            _ => break,
        }
    }

    let trimmed = current.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn parse_chain_id(raw: Option<&str>) -> Result<u64, RequestError> {
    let raw = raw.map(str::trim).unwrap_or_default();
    if raw.is_empty() {
        return Err(RequestError::MissingChainId);
    }
    if !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RequestError::InvalidChainId);
    }

    match raw.parse::<u64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(RequestError::InvalidChainId),
    }
}

/// Splits a raw query string (without the leading `?`) into a [`LinkRequest`].
pub fn parse_link_query(
    raw_query: &str,
    supported_chains: &[u64],
) -> Result<LinkRequest, RequestError> {
    let mut method = None;
    let mut chain_id = None;
    let mut params = None;
    let mut redirect = None;

    for (key, value) in form_urlencoded::parse(raw_query.as_bytes()) {
        let slot = match &*key {
            "method" => &mut method,
            "chainId" => &mut chain_id,
            "params" => &mut params,
            "redirect_url" => &mut redirect,
            _ => continue,
        };
        if slot.is_none() {
            *slot = Some(value.into_owned());
        }
    }

    let chain_id = parse_chain_id(chain_id.as_deref())?;
    if !supported_chains.contains(&chain_id) {
        return Err(RequestError::UnsupportedChainId(chain_id));
    }

    Ok(LinkRequest {
        spec: RpcRequestSpec {
            method: method.unwrap_or_default(),
            raw_params: params.as_deref().and_then(decode_json_param),
            chain_id,
        },
        redirect_url: redirect.as_deref().and_then(decode_redirect_template),
    })
}
