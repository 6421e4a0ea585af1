//! Shapes loosely structured link params into the positional params each wallet
//! method expects.

use crate::error::RequestError;
use crate::types::NormalizedRequest;
use serde_json::{Map, Value};

pub fn normalize(
    method: &str,
    raw_params: Option<&Value>,
    fallback_address: Option<&str>,
) -> NormalizedRequest {
    if method.trim().is_empty() {
        return Err(RequestError::MissingMethod);
    }

    let object = match raw_params {
        None | Some(Value::Null) => return Err(RequestError::MissingParams),
        // Arrays are the caller's literal positional params.
        Some(Value::Array(params)) => return Ok(params.clone()),
        Some(Value::Object(object)) => object,
        Some(_) => return Err(RequestError::ParamsNotObjectOrArray),
    };

    match method {
        "eth_sendTransaction" | "wallet_sendCalls" => {
            Ok(vec![with_sender(object, fallback_address)])
        }
        "personal_sign" => personal_sign(object, fallback_address),
        "eth_signTypedData_v4" => sign_typed_data(object, fallback_address),
        _ => Ok(vec![Value::Object(object.clone())]),
    }
}

/// Fills `from` from the connected wallet when the link leaves it out.
///
/// Without any address `from` stays unset so the request can still be previewed;
/// the wallet fills it or rejects the call at execution time.
fn with_sender(object: &Map<String, Value>, fallback_address: Option<&str>) -> Value {
    let mut shaped = object.clone();
    let has_from = !matches!(shaped.get("from"), None | Some(Value::Null));

    if !has_from {
        match fallback_address.filter(|address| !address.is_empty()) {
            Some(address) => {
                shaped.insert("from".to_string(), Value::String(address.to_string()));
            }
            None => {
                shaped.remove("from");
            }
        }
    }

    Value::Object(shaped)
}

fn personal_sign(
    object: &Map<String, Value>,
    fallback_address: Option<&str>,
) -> NormalizedRequest {
    let message = first_present(object, &["message", "data"]);
    let address = address_param(object, fallback_address).ok_or(RequestError::MissingAddress {
        method: "personal_sign",
    })?;

    let Some(Value::String(message)) = message else {
        return Err(RequestError::MessageNotString);
    };

    let message = if message.starts_with("0x") {
        message.clone()
    } else {
        format!("0x{}", hex::encode(message.as_bytes()))
    };

    Ok(vec![Value::String(message), Value::String(address)])
}

fn sign_typed_data(
    object: &Map<String, Value>,
    fallback_address: Option<&str>,
) -> NormalizedRequest {
    let address = address_param(object, fallback_address).ok_or(RequestError::MissingAddress {
        method: "eth_signTypedData_v4",
    })?;

    let typed_data = match first_present(object, &["typedData", "data"]) {
        None => return Err(RequestError::MissingTypedData),
        Some(Value::String(serialized)) => serialized.clone(),
        Some(value) => value.to_string(),
    };

    Ok(vec![Value::String(address), Value::String(typed_data)])
}

/// First of `keys` holding a non-null value.
fn first_present<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .find(|value| !value.is_null())
}

fn address_param(object: &Map<String, Value>, fallback_address: Option<&str>) -> Option<String> {
    match object.get("address") {
        Some(Value::String(address)) if !address.is_empty() => Some(address.clone()),
        _ => fallback_address
            .filter(|address| !address.is_empty())
            .map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ADDR: &str = "0xABC";

    fn error_message(result: NormalizedRequest) -> String {
        result.unwrap_err().to_string()
    }

    #[test]
    fn test_missing_method() {
        let params = json!({});
        assert_eq!(
            error_message(normalize("", Some(&params), Some(ADDR))),
            "missing method"
        );
    }

    #[test]
    fn test_missing_params() {
        assert_eq!(
            error_message(normalize("eth_sendTransaction", None, Some(ADDR))),
            "missing or invalid params (expected JSON)"
        );
        assert_eq!(
            error_message(normalize("eth_sendTransaction", Some(&Value::Null), Some(ADDR))),
            "missing or invalid params (expected JSON)"
        );
    }

    #[test]
    fn test_scalar_params_rejected() {
        for params in [json!("hello"), json!(42), json!(true)] {
            assert_eq!(
                error_message(normalize("personal_sign", Some(&params), Some(ADDR))),
                "`params` must be a JSON object or JSON array."
            );
        }
    }

    #[test]
    fn test_array_passthrough() {
        let params = json!(["0xdead", "0x1234", {"extra": true}]);
        assert_eq!(
            normalize("personal_sign", Some(&params), None).unwrap(),
            vec![json!("0xdead"), json!("0x1234"), json!({"extra": true})]
        );
    }

    #[test]
    fn test_unknown_method_wraps_object() {
        let params = json!({"chainId": "0x1", "nested": {"k": [1, 2]}});
        for method in ["wallet_watchAsset", "eth_call", "custom_thing"] {
            assert_eq!(
                normalize(method, Some(&params), Some(ADDR)).unwrap(),
                vec![params.clone()]
            );
        }
    }

    #[test]
    fn test_send_transaction_from_fallback() {
        let params = json!({"to": "0x1", "value": "0x0"});
        assert_eq!(
            normalize("eth_sendTransaction", Some(&params), Some(ADDR)).unwrap(),
            vec![json!({"to": "0x1", "value": "0x0", "from": ADDR})]
        );
    }

    #[test]
    fn test_send_transaction_explicit_from_wins() {
        let params = json!({"to": "0x1", "from": "0xDEF"});
        assert_eq!(
            normalize("eth_sendTransaction", Some(&params), Some(ADDR)).unwrap(),
            vec![json!({"to": "0x1", "from": "0xDEF"})]
        );
    }

    #[test]
    fn test_send_transaction_without_any_address_omits_from() {
        let params = json!({"to": "0x1", "from": null});
        let shaped = normalize("eth_sendTransaction", Some(&params), None).unwrap();
        assert_eq!(shaped, vec![json!({"to": "0x1"})]);
    }

    #[test]
    fn test_send_calls_shaped_like_transaction() {
        let params = json!({"version": "1.0", "calls": [{"to": "0x1", "data": "0x"}]});
        assert_eq!(
            normalize("wallet_sendCalls", Some(&params), Some(ADDR)).unwrap(),
            vec![json!({"version": "1.0", "calls": [{"to": "0x1", "data": "0x"}], "from": ADDR})]
        );
    }

    #[test]
    fn test_send_calls_without_any_address_omits_from() {
        let params = json!({"calls": [{"to": "0x1"}], "from": null});
        assert_eq!(
            normalize("wallet_sendCalls", Some(&params), None).unwrap(),
            vec![json!({"calls": [{"to": "0x1"}]})]
        );

        let params = json!({"calls": []});
        assert_eq!(
            normalize("wallet_sendCalls", Some(&params), Some("")).unwrap(),
            vec![json!({"calls": []})]
        );
    }

    #[test]
    fn test_personal_sign_hex_encodes_text() {
        let params = json!({"message": "hello"});
        assert_eq!(
            normalize("personal_sign", Some(&params), Some(ADDR)).unwrap(),
            vec![json!("0x68656c6c6f"), json!(ADDR)]
        );
    }

    #[test]
    fn test_personal_sign_keeps_hex_message() {
        let params = json!({"message": "0xdead"});
        assert_eq!(
            normalize("personal_sign", Some(&params), Some(ADDR)).unwrap(),
            vec![json!("0xdead"), json!(ADDR)]
        );
    }

    #[test]
    fn test_personal_sign_data_and_address_fields() {
        let params = json!({"data": "héllo", "address": "0xDEF"});
        assert_eq!(
            normalize("personal_sign", Some(&params), Some(ADDR)).unwrap(),
            vec![json!("0x68c3a96c6c6f"), json!("0xDEF")]
        );
    }

    #[test]
    fn test_personal_sign_needs_address() {
        let params = json!({"message": "hello"});
        let message = error_message(normalize("personal_sign", Some(&params), None));
        assert!(message.starts_with("personal_sign needs an address"), "{message}");
    }

    #[test]
    fn test_personal_sign_needs_string_message() {
        for params in [json!({"message": 7}), json!({}), json!({"data": {"x": 1}})] {
            assert_eq!(
                error_message(normalize("personal_sign", Some(&params), Some(ADDR))),
                "personal_sign needs `params.message` (or `params.data`) as a string"
            );
        }
    }

    #[test]
    fn test_typed_data_serialized() {
        let params = json!({"address": "0xABC", "typedData": {"a": 1}});
        assert_eq!(
            normalize("eth_signTypedData_v4", Some(&params), None).unwrap(),
            vec![json!("0xABC"), json!("{\"a\":1}")]
        );
    }

    #[test]
    fn test_typed_data_string_verbatim() {
        let params = json!({"data": "{\"b\": 2}"});
        assert_eq!(
            normalize("eth_signTypedData_v4", Some(&params), Some(ADDR)).unwrap(),
            vec![json!(ADDR), json!("{\"b\": 2}")]
        );
    }

    #[test]
    fn test_typed_data_errors() {
        let params = json!({"typedData": {"a": 1}});
        let message = error_message(normalize("eth_signTypedData_v4", Some(&params), None));
        assert!(message.starts_with("eth_signTypedData_v4 needs an address"), "{message}");

        let params = json!({"typedData": null});
        assert_eq!(
            error_message(normalize("eth_signTypedData_v4", Some(&params), Some(ADDR))),
            "eth_signTypedData_v4 needs `params.typedData` (or `params.data`)"
        );
    }
}
