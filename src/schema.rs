//! Structural schema validators
//!
//! Every `is_*` function is a total predicate over arbitrary JSON: it never
//! panics and never mutates. Required fields must carry the declared JSON
//! type, optional fields may be absent or `null`, and unknown fields are
//! ignored. Numbers must be JSON numbers; `"27"` is not a number.

use serde_json::{json, Map, Value};

/// Named target shapes for structured generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schema {
    AgentSettings,
    VerifyParams,
    PriceQueryParams,
    AttpsPriceQuery,
    AttpsPriceQueryResponse,
    PriceData,
}

impl Schema {
    pub fn name(&self) -> &'static str {
        match self {
            Schema::AgentSettings => "AgentSettings",
            Schema::VerifyParams => "VerifyParams",
            Schema::PriceQueryParams => "PriceQueryParams",
            Schema::AttpsPriceQuery => "AttpsPriceQuery",
            Schema::AttpsPriceQueryResponse => "AttpsPriceQueryResponse",
            Schema::PriceData => "PriceData",
        }
    }

    /// Run the matching predicate.
    pub fn validate(&self, value: &Value) -> bool {
        match self {
            Schema::AgentSettings => is_agent_settings(value),
            Schema::VerifyParams => is_verify_params(value),
            Schema::PriceQueryParams => is_price_query_params(value),
            Schema::AttpsPriceQuery => is_attps_price_query(value),
            Schema::AttpsPriceQueryResponse => is_attps_price_query_response(value),
            Schema::PriceData => is_price_data(value),
        }
    }

    /// JSON-Schema description of the shape, handed to the generator.
    ///
    /// Optional fields are simply left out of `required`.
    pub fn json_schema(&self) -> Value {
        match self {
            Schema::AgentSettings => json!({
                "type": "object",
                "properties": {
                    "signers": { "type": "array", "items": { "type": "string" } },
                    "threshold": { "type": "number" },
                    "converterAddress": { "type": "string" },
                    "agentHeader": {
                        "type": "object",
                        "properties": {
                            "messageId": { "type": "string" },
                            "sourceAgentId": { "type": "string" },
                            "sourceAgentName": { "type": "string" },
                            "targetAgentId": { "type": "string" },
                            "timestamp": { "type": "number" },
                            "messageType": { "type": "number" },
                            "priority": { "type": "number" },
                            "ttl": { "type": "number" }
                        },
                        "required": ["sourceAgentName", "targetAgentId", "messageType", "priority", "ttl"]
                    }
                },
                "required": ["signers", "threshold", "converterAddress", "agentHeader"]
            }),
            Schema::VerifyParams => json!({
                "type": "object",
                "properties": {
                    "agent": { "type": "string" },
                    "digest": { "type": "string" },
                    "payload": {
                        "type": "object",
                        "properties": {
                            "data": { "type": "string" },
                            "dataHash": { "type": "string" },
                            "signatures": {
                                "type": "array",
                                "items": {
                                    "type": "object",
                                    "properties": {
                                        "r": { "type": "string" },
                                        "s": { "type": "string" },
                                        "v": { "type": "number" }
                                    },
                                    "required": ["r", "s", "v"]
                                }
                            },
                            "metadata": {
                                "type": "object",
                                "properties": {
                                    "contentType": { "type": "string" },
                                    "encoding": { "type": "string" },
                                    "compression": { "type": "string" }
                                }
                            }
                        },
                        "required": ["data", "signatures"]
                    }
                },
                "required": ["agent", "digest", "payload"]
            }),
            Schema::PriceQueryParams => json!({
                "type": "object",
                "properties": { "pair": { "type": "string" } },
                "required": ["pair"]
            }),
            Schema::AttpsPriceQuery => json!({
                "type": "object",
                "properties": {
                    "sourceAgentId": { "type": "string" },
                    "feedId": { "type": "string" }
                },
                "required": ["sourceAgentId", "feedId"]
            }),
            Schema::AttpsPriceQueryResponse => object_schema(
                &[
                    ("feedId", "string"),
                    ("validTimeStamp", "number"),
                    ("observeTimeStamp", "number"),
                    ("nativeFee", "number"),
                    ("tokenFee", "number"),
                    ("expireTimeStamp", "number"),
                    ("midPrice", "string"),
                    ("askPrice", "string"),
                    ("bidPrice", "string"),
                ],
            ),
            Schema::PriceData => {
                let mut schema = object_schema(&[
                    ("feedId", "string"),
                    ("pair", "string"),
                    ("bidPrice", "string"),
                    ("askPrice", "string"),
                    ("midPrice", "string"),
                    ("bidPriceChange", "number"),
                    ("askPriceChange", "number"),
                    ("midPriceChange", "number"),
                    ("timestamp", "number"),
                ]);
                schema["properties"]["networks"] =
                    json!({ "type": "array", "items": { "type": "string" } });
                if let Some(required) = schema["required"].as_array_mut() {
                    required.push(json!("networks"));
                }
                schema
            }
        }
    }
}

/// Flat object schema where every listed field is required.
fn object_schema(fields: &[(&str, &str)]) -> Value {
    let properties: Map<String, Value> = fields
        .iter()
        .map(|(name, ty)| (name.to_string(), json!({ "type": ty })))
        .collect();
    let required: Vec<&str> = fields.iter().map(|(name, _)| *name).collect();

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

//
// ================= Field Predicates =================
//

fn string_field(obj: &Map<String, Value>, key: &str) -> bool {
    matches!(obj.get(key), Some(Value::String(_)))
}

fn number_field(obj: &Map<String, Value>, key: &str) -> bool {
    matches!(obj.get(key), Some(Value::Number(_)))
}

fn nullish_string_field(obj: &Map<String, Value>, key: &str) -> bool {
    matches!(obj.get(key), None | Some(Value::Null) | Some(Value::String(_)))
}

fn nullish_number_field(obj: &Map<String, Value>, key: &str) -> bool {
    matches!(obj.get(key), None | Some(Value::Null) | Some(Value::Number(_)))
}

fn string_array_field(obj: &Map<String, Value>, key: &str) -> bool {
    match obj.get(key) {
        Some(Value::Array(items)) => items.iter().all(Value::is_string),
        _ => false,
    }
}

//
// ================= Validators =================
//

pub fn is_agent_settings(value: &Value) -> bool {
    let Some(obj) = value.as_object() else {
        return false;
    };

    string_array_field(obj, "signers")
        && number_field(obj, "threshold")
        && string_field(obj, "converterAddress")
        && obj
            .get("agentHeader")
            .and_then(Value::as_object)
            .is_some_and(is_agent_header)
}

fn is_agent_header(header: &Map<String, Value>) -> bool {
    nullish_string_field(header, "messageId")
        && nullish_string_field(header, "sourceAgentId")
        && string_field(header, "sourceAgentName")
        && string_field(header, "targetAgentId")
        && nullish_number_field(header, "timestamp")
        && number_field(header, "messageType")
        && number_field(header, "priority")
        && number_field(header, "ttl")
}

pub fn is_verify_params(value: &Value) -> bool {
    let Some(obj) = value.as_object() else {
        return false;
    };

    string_field(obj, "agent")
        && string_field(obj, "digest")
        && obj
            .get("payload")
            .and_then(Value::as_object)
            .is_some_and(is_message_payload)
}

fn is_message_payload(payload: &Map<String, Value>) -> bool {
    let signatures_ok = match payload.get("signatures") {
        Some(Value::Array(items)) => items.iter().all(is_signature),
        _ => false,
    };

    let metadata_ok = match payload.get("metadata") {
        None | Some(Value::Null) => true,
        Some(Value::Object(metadata)) => {
            nullish_string_field(metadata, "contentType")
                && nullish_string_field(metadata, "encoding")
                && nullish_string_field(metadata, "compression")
        }
        Some(_) => false,
    };

    string_field(payload, "data")
        && nullish_string_field(payload, "dataHash")
        && signatures_ok
        && metadata_ok
}

fn is_signature(value: &Value) -> bool {
    value.as_object().is_some_and(|sig| {
        string_field(sig, "r") && string_field(sig, "s") && number_field(sig, "v")
    })
}

pub fn is_price_query_params(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|obj| string_field(obj, "pair"))
}

pub fn is_attps_price_query(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|obj| string_field(obj, "sourceAgentId") && string_field(obj, "feedId"))
}

pub fn is_attps_price_query_response(value: &Value) -> bool {
    let Some(obj) = value.as_object() else {
        return false;
    };

    string_field(obj, "feedId")
        && ["validTimeStamp", "observeTimeStamp", "nativeFee", "tokenFee", "expireTimeStamp"]
            .iter()
            .all(|key| number_field(obj, key))
        && ["midPrice", "askPrice", "bidPrice"]
            .iter()
            .all(|key| string_field(obj, key))
}

pub fn is_price_data(value: &Value) -> bool {
    let Some(obj) = value.as_object() else {
        return false;
    };

    ["feedId", "pair", "bidPrice", "askPrice", "midPrice"]
        .iter()
        .all(|key| string_field(obj, key))
        && string_array_field(obj, "networks")
        && ["bidPriceChange", "askPriceChange", "midPriceChange", "timestamp"]
            .iter()
            .all(|key| number_field(obj, key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttpsPriceQueryResponse, PriceData};

    fn valid_verify_params() -> Value {
        json!({
            "agent": "0x1111111111111111111111111111111111111111",
            "digest": "0x2222222222222222222222222222222222222222222222222222222222222222",
            "payload": {
                "data": "0x68656c6c6f",
                "signatures": [
                    { "r": "0x01", "s": "0x02", "v": 27 },
                    { "r": "0x03", "s": "0x04", "v": 1 }
                ],
                "metadata": { "contentType": "text/plain", "encoding": null }
            }
        })
    }

    fn valid_agent_settings() -> Value {
        json!({
            "signers": ["0xa", "0xb"],
            "threshold": 2,
            "converterAddress": "0xc",
            "agentHeader": {
                "sourceAgentName": "source",
                "targetAgentId": "target",
                "messageType": 0,
                "priority": 1,
                "ttl": 3600
            }
        })
    }

    #[test]
    fn test_verify_params_accepts_valid_shape() {
        assert!(is_verify_params(&valid_verify_params()));
    }

    #[test]
    fn test_verify_params_allows_extra_fields() {
        let mut value = valid_verify_params();
        value["extra"] = json!({ "anything": true });
        value["payload"]["signatures"][0]["note"] = json!("ignored");
        assert!(is_verify_params(&value));
    }

    #[test]
    fn test_verify_params_rejects_missing_agent() {
        let mut value = valid_verify_params();
        value.as_object_mut().unwrap().remove("agent");
        assert!(!is_verify_params(&value));
    }

    #[test]
    fn test_verify_params_rejects_string_v() {
        let mut value = valid_verify_params();
        value["payload"]["signatures"][0]["v"] = json!("27");
        assert!(!is_verify_params(&value));
    }

    #[test]
    fn test_verify_params_rejects_bad_metadata() {
        let mut value = valid_verify_params();
        value["payload"]["metadata"] = json!("text/plain");
        assert!(!is_verify_params(&value));

        value["payload"]["metadata"] = json!({ "compression": 7 });
        assert!(!is_verify_params(&value));

        value["payload"]["metadata"] = Value::Null;
        assert!(is_verify_params(&value));
    }

    #[test]
    fn test_verify_params_rejects_non_array_signatures() {
        let mut value = valid_verify_params();
        value["payload"]["signatures"] = json!({ "r": "0x01", "s": "0x02", "v": 27 });
        assert!(!is_verify_params(&value));
    }

    #[test]
    fn test_verify_params_rejects_non_objects() {
        for value in [Value::Null, json!(42), json!("params"), json!([valid_verify_params()])] {
            assert!(!is_verify_params(&value));
        }
        assert!(!is_verify_params(&json!({ "agent": "x" })));
    }

    #[test]
    fn test_validators_are_idempotent() {
        let good = valid_verify_params();
        let bad = json!({ "agent": "x" });
        for value in [&good, &bad] {
            assert_eq!(is_verify_params(value), is_verify_params(value));
        }
        assert_eq!(good, valid_verify_params());
    }

    #[test]
    fn test_agent_settings() {
        let value = valid_agent_settings();
        assert!(is_agent_settings(&value));

        let mut with_nulls = value.clone();
        with_nulls["agentHeader"]["messageId"] = Value::Null;
        with_nulls["agentHeader"]["timestamp"] = Value::Null;
        assert!(is_agent_settings(&with_nulls));

        let mut string_ttl = value.clone();
        string_ttl["agentHeader"]["ttl"] = json!("3600");
        assert!(!is_agent_settings(&string_ttl));

        let mut bad_signer = value.clone();
        bad_signer["signers"] = json!(["0xa", 1]);
        assert!(!is_agent_settings(&bad_signer));
    }

    #[test]
    fn test_agent_settings_does_not_check_threshold() {
        let mut value = valid_agent_settings();
        value["threshold"] = json!(10);
        assert!(is_agent_settings(&value));
    }

    #[test]
    fn test_price_shapes() {
        assert!(is_price_query_params(&json!({ "pair": "BTC/USD" })));
        assert!(!is_price_query_params(&json!({ "pair": 1 })));

        assert!(is_attps_price_query(&json!({ "sourceAgentId": "a", "feedId": "f" })));
        assert!(!is_attps_price_query(&json!({ "feedId": "f" })));

        let response = AttpsPriceQueryResponse {
            feed_id: "f".to_string(),
            valid_time_stamp: 1.0,
            observe_time_stamp: 2.0,
            native_fee: 0.0,
            token_fee: 0.0,
            expire_time_stamp: 3.0,
            mid_price: "100".to_string(),
            ask_price: "101".to_string(),
            bid_price: "99".to_string(),
        };
        let value = serde_json::to_value(&response).unwrap();
        assert!(is_attps_price_query_response(&value));
        let back: AttpsPriceQueryResponse = serde_json::from_value(value).unwrap();
        assert_eq!(back, response);

        let data = PriceData {
            feed_id: "f".to_string(),
            pair: "BTC/USD".to_string(),
            networks: vec!["bsc".to_string()],
            bid_price: "99".to_string(),
            ask_price: "101".to_string(),
            mid_price: "100".to_string(),
            bid_price_change: 0.1,
            ask_price_change: 0.2,
            mid_price_change: 0.15,
            timestamp: 1_700_000_000.0,
        };
        assert!(is_price_data(&serde_json::to_value(&data).unwrap()));
    }

    #[test]
    fn test_schema_dispatch_and_json_schema() {
        assert!(Schema::VerifyParams.validate(&valid_verify_params()));
        assert!(!Schema::AgentSettings.validate(&valid_verify_params()));

        let schema = Schema::VerifyParams.json_schema();
        assert_eq!(schema["required"], json!(["agent", "digest", "payload"]));

        let price = Schema::PriceData.json_schema();
        assert!(price["required"]
            .as_array()
            .unwrap()
            .contains(&json!("networks")));
    }
}
