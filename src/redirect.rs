//! Builds the navigation target after an execution outcome.
//!
//! A template containing `{{` is filled in place (template mode); any other value
//! is treated as a URL and gets `result`/`resultType` or `error` query parameters
//! (append mode). Either way only `http` and `https` targets are produced.

use crate::error::RedirectError;
use crate::types::{RedirectPayload, ResultType};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde_json::Value;
use url::Url;

/// Characters `encodeURIComponent` leaves untouched.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Largest integer a JavaScript number holds exactly (2^53 - 1).
const MAX_SAFE_INTEGER: u64 = 9_007_199_254_740_991;

const TEMPLATE_MARKER: &str = "{{";

pub fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}

/// Serialized form of an execution result plus how it was serialized.
pub fn stringify_result(result: &Value) -> (ResultType, String) {
    match result {
        Value::String(s) => (ResultType::String, s.clone()),
        other => (ResultType::Json, widen_integers(other).to_string()),
    }
}

/// Integers beyond the exactly-representable JS range become decimal strings.
fn widen_integers(value: &Value) -> Value {
    match value {
        Value::Number(n) => {
            // Numbers keep their source text, so integers of any width arrive intact.
            let text = n.to_string();
            let is_integer = !text.contains(['.', 'e', 'E']);
            let digits = text.strip_prefix('-').unwrap_or(&text);
            let unsafe_int =
                is_integer && digits.parse::<u64>().map_or(true, |v| v > MAX_SAFE_INTEGER);
            if unsafe_int {
                Value::String(text)
            } else {
                value.clone()
            }
        }
        Value::Array(items) => Value::Array(items.iter().map(widen_integers).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), widen_integers(v)))
                .collect(),
        ),
        _ => value.clone(),
    }
}

pub struct RedirectBuilder {
    origin: Url,
}

impl RedirectBuilder {
    /// `origin` is the base relative targets resolve against.
    pub fn new(origin: Url) -> Self {
        Self { origin }
    }

    pub fn build(&self, template: &str, payload: &RedirectPayload) -> Result<String, RedirectError> {
        let url = if template.contains(TEMPLATE_MARKER) {
            self.resolve(&fill_template(template, payload))?
        } else {
            let mut url = self.resolve(template)?;
            match payload {
                RedirectPayload::Error(error) => set_query_param(&mut url, "error", error),
                RedirectPayload::Result(result) => {
                    let (result_type, serialized) = stringify_result(result);
                    set_query_param(&mut url, "resultType", result_type.as_str());
                    set_query_param(&mut url, "result", &serialized);
                }
            }
            url
        };

        Ok(url.to_string())
    }

    fn resolve(&self, target: &str) -> Result<Url, RedirectError> {
        let url = self
            .origin
            .join(target)
            .map_err(|e| RedirectError::InvalidUrl(e.to_string()))?;

        match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => Err(RedirectError::UnsupportedProtocol(format!("{scheme}:"))),
        }
    }
}

/// Substitutes placeholders in one left-to-right pass.
///
/// Tokens are matched whole at each `{{`, so `{{result}}` never matches inside
/// `{{result_raw}}`, and text that came from a substitution is never rescanned.
fn fill_template(template: &str, payload: &RedirectPayload) -> String {
    let (result_type, result_raw) = match payload {
        RedirectPayload::Result(result) => {
            let (result_type, serialized) = stringify_result(result);
            (result_type.as_str(), serialized)
        }
        RedirectPayload::Error(_) => ("", String::new()),
    };
    let error_raw = match payload {
        RedirectPayload::Error(error) => error.as_str(),
        RedirectPayload::Result(_) => "",
    };
    let result = encode_component(&result_raw);
    let error = encode_component(error_raw);

    let tokens: [(&str, &str); 5] = [
        ("{{resultType}}", result_type),
        ("{{result_raw}}", &result_raw),
        ("{{error_raw}}", error_raw),
        ("{{result}}", &result),
        ("{{error}}", &error),
    ];

    let mut filled = String::with_capacity(template.len() + result_raw.len());
    let mut rest = template;
    while let Some(start) = rest.find(TEMPLATE_MARKER) {
        filled.push_str(&rest[..start]);
        let candidate = &rest[start..];
        match tokens.iter().find(|(token, _)| candidate.starts_with(token)) {
            Some((token, value)) => {
                filled.push_str(value);
                rest = &candidate[token.len()..];
            }
            None => {
                filled.push_str(TEMPLATE_MARKER);
                rest = &candidate[TEMPLATE_MARKER.len()..];
            }
        }
    }
    filled.push_str(rest);
    filled
}

/// `URLSearchParams.set`: replaces the first `key` in place, drops duplicates, or appends.
fn set_query_param(url: &mut Url, key: &str, value: &str) {
    let mut replaced = false;
    let mut pairs: Vec<(String, String)> = Vec::new();
    for (k, v) in url.query_pairs() {
        if k == key {
            if !replaced {
                pairs.push((k.into_owned(), value.to_string()));
                replaced = true;
            }
        } else {
            pairs.push((k.into_owned(), v.into_owned()));
        }
    }
    if !replaced {
        pairs.push((key.to_string(), value.to_string()));
    }

    url.query_pairs_mut().clear().extend_pairs(pairs);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn builder() -> RedirectBuilder {
        RedirectBuilder::new(Url::parse("https://link.example.org/app/").unwrap())
    }

    fn query_value(url: &str, key: &str) -> Option<String> {
        Url::parse(url)
            .unwrap()
            .query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    #[test]
    fn test_append_json_result_round_trip() {
        let url = builder()
            .build("https://dapp.example.com/done", &RedirectPayload::Result(json!({"x": 1})))
            .unwrap();

        assert_eq!(query_value(&url, "resultType").as_deref(), Some("json"));
        let result: Value = serde_json::from_str(&query_value(&url, "result").unwrap()).unwrap();
        assert_eq!(result, json!({"x": 1}));
    }

    #[test]
    fn test_append_string_result() {
        let url = builder()
            .build(
                "https://dapp.example.com/done?keep=1",
                &RedirectPayload::Result(json!("0xabc")),
            )
            .unwrap();
        assert_eq!(
            url,
            "https://dapp.example.com/done?keep=1&resultType=string&result=0xabc"
        );
    }

    #[test]
    fn test_append_replaces_existing_params() {
        let url = builder()
            .build(
                "https://dapp.example.com/done?result=old&a=b&result=dup",
                &RedirectPayload::Result(json!("new")),
            )
            .unwrap();
        assert_eq!(
            url,
            "https://dapp.example.com/done?result=new&a=b&resultType=string"
        );
    }

    #[test]
    fn test_append_error() {
        let url = builder()
            .build(
                "https://dapp.example.com/done",
                &RedirectPayload::Error("User rejected the request.".to_string()),
            )
            .unwrap();
        assert_eq!(
            query_value(&url, "error").as_deref(),
            Some("User rejected the request.")
        );
        assert_eq!(query_value(&url, "result"), None);
        assert_eq!(query_value(&url, "resultType"), None);
    }

    #[test]
    fn test_relative_target_resolves_against_origin() {
        let url = builder()
            .build("/thanks", &RedirectPayload::Result(json!("ok")))
            .unwrap();
        assert_eq!(
            url,
            "https://link.example.org/thanks?resultType=string&result=ok"
        );
    }

    #[test]
    fn test_rejects_non_http_protocols() {
        let payload = RedirectPayload::Result(json!("x"));
        for target in [
            "javascript:alert(1)",
            "data:text/html,hi",
            "javascript:alert('{{result}}')",
            "ftp://example.com/{{result}}",
        ] {
            let err = builder().build(target, &payload).unwrap_err();
            assert!(
                err.to_string().starts_with("unsupported redirect protocol"),
                "{target}: {err}"
            );
        }
    }

    #[test]
    fn test_template_tokens() {
        let template = "https://dapp.example.com/cb?t={{resultType}}&r={{result}}&raw={{result_raw}}&e={{error}}";
        let url = builder()
            .build(template, &RedirectPayload::Result(json!({"a": "b c"})))
            .unwrap();
        assert_eq!(
            url,
            "https://dapp.example.com/cb?t=json&r=%7B%22a%22%3A%22b%20c%22%7D&raw={%22a%22:%22b%20c%22}&e="
        );
    }

    #[test]
    fn test_template_result_and_result_raw_independent() {
        let url = builder()
            .build(
                "https://dapp.example.com/cb#{{result_raw}}|{{result}}",
                &RedirectPayload::Result(json!("a/b")),
            )
            .unwrap();
        assert_eq!(url, "https://dapp.example.com/cb#a/b|a%2Fb");
    }

    #[test]
    fn test_template_error_tokens() {
        let url = builder()
            .build(
                "https://dapp.example.com/cb?err={{error}}&t={{resultType}}&r={{result}}#{{error_raw}}",
                &RedirectPayload::Error("no & way".to_string()),
            )
            .unwrap();
        assert_eq!(
            url,
            "https://dapp.example.com/cb?err=no%20%26%20way&t=&r=#no%20&%20way"
        );
    }

    #[test]
    fn test_template_values_are_not_rescanned() {
        let filled = fill_template(
            "{{result_raw}}-{{error}}",
            &RedirectPayload::Result(json!("{{error}}")),
        );
        assert_eq!(filled, "{{error}}-");
    }

    #[test]
    fn test_unknown_placeholder_left_alone() {
        let filled = fill_template("{{other}}{{result}}", &RedirectPayload::Result(json!("x")));
        assert_eq!(filled, "{{other}}x");
    }

    #[test]
    fn test_large_integers_serialize_as_strings() {
        let (result_type, serialized) =
            stringify_result(&json!({"big": 18446744073709551615u64, "neg": -9007199254740993i64, "small": 42}));
        assert_eq!(result_type, ResultType::Json);
        let parsed: Value = serde_json::from_str(&serialized).unwrap();
        assert_eq!(
            parsed,
            json!({"big": "18446744073709551615", "neg": "-9007199254740993", "small": 42})
        );
    }

    #[test]
    fn test_integers_wider_than_u64_keep_digits() {
        let wallet_result: Value = serde_json::from_str(
            r#"{"v":123456789012345678901234567890,"n":-98765432109876543210987,"f":1.5}"#,
        )
        .unwrap();
        let (_, serialized) = stringify_result(&wallet_result);
        assert_eq!(
            serialized,
            r#"{"f":1.5,"n":"-98765432109876543210987","v":"123456789012345678901234567890"}"#
        );

        let url = builder()
            .build("https://d.example.com/x", &RedirectPayload::Result(wallet_result))
            .unwrap();
        let result: Value = serde_json::from_str(&query_value(&url, "result").unwrap()).unwrap();
        assert_eq!(result["v"], json!("123456789012345678901234567890"));
    }

    #[test]
    fn test_build_is_deterministic() {
        let payload = RedirectPayload::Result(json!({"hash": "0x01", "n": [1, 2]}));
        for template in ["https://d.example.com/x", "https://d.example.com/x?r={{result}}"] {
            assert_eq!(
                builder().build(template, &payload).unwrap(),
                builder().build(template, &payload).unwrap()
            );
        }
    }
}
