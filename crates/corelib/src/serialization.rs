//! Wire encoding for [`Value`].
//!
//! Every value becomes a JSON node of the form `{"type": <tag>, "value": ...}`
//! so that type information survives the trip:
//!
//! ```text
//! undefined  {"type":"undefined"}
//! null       {"type":"null"}
//! boolean    {"type":"boolean","value":false}
//! number     {"type":"number","value":"NaN"}        textual, keeps NaN/Infinity/-0
//! string     {"type":"string","value":"hi"}
//! array      {"type":"array","value":[<node>, ...]}
//! object     {"type":"object","value":{"k":<node>}}
//! error      {"type":"error","value":{"name":"NotFoundError","message":"..."}}
//! date       {"type":"date","value":1700000000000}
//! ```
//!
//! Decoding treats its input as untrusted: anything that does not match the
//! shapes above yields [`Error::Deserialization`].
//!
//! Containers nest at most [`MAX_DEPTH`] levels. Outbound messages deeper than
//! that are refused with [`Error::Validation`] before they reach the wire, and
//! the decoder rejects deeper input, so whatever one node accepts to send its
//! peer can decode.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value as Json};

use crate::error::{Error, Result};
use crate::value::{ErrorValue, Value};

const TYPE: &str = "type";
const VALUE: &str = "value";

/// Deepest container nesting carried on the wire.
///
/// Each container level costs two JSON levels, which keeps a full-depth
/// payload well inside serde_json's own recursion limit.
pub const MAX_DEPTH: usize = 32;

/// Encodes a value into its wire form.
pub fn serialize(value: &Value) -> String {
    encode(value).to_string()
}

/// Decodes a wire form produced by [`serialize`].
pub fn deserialize(wire: &str) -> Result<Value> {
    let json: Json = serde_json::from_str(wire)
        .map_err(|e| Error::deserialization(format!("malformed wire payload: {}", e)))?;
    decode(&json, 0)
}

/// Container nesting of `value`; scalars are depth 0.
pub fn depth(value: &Value) -> usize {
    match value {
        Value::Array(items) => 1 + items.iter().map(depth).max().unwrap_or(0),
        Value::Object(map) => 1 + map.values().map(depth).max().unwrap_or(0),
        _ => 0,
    }
}

/// Fails with a validation error when `value` nests deeper than [`MAX_DEPTH`].
pub fn check_depth(value: &Value) -> Result<()> {
    let found = depth(value);
    if found > MAX_DEPTH {
        return Err(Error::validation(format!(
            "value nests {} levels deep, at most {} are allowed",
            found, MAX_DEPTH
        )));
    }
    Ok(())
}

/// Wraps a non-sequence message into a one-element argument list.
pub fn normalize_message(message: Value) -> Vec<Value> {
    match message {
        Value::Array(items) => items,
        other => vec![other],
    }
}

/// Encodes a message as the argument list carried in a request body.
///
/// The argument list itself counts as one level of nesting.
pub fn serialize_message(message: Value) -> Result<String> {
    let args = Value::Array(normalize_message(message));
    check_depth(&args)?;
    Ok(serialize(&args))
}

/// Decodes a request body into positional arguments.
pub fn deserialize_args(wire: &str) -> Result<Vec<Value>> {
    match deserialize(wire)? {
        Value::Array(items) => Ok(items),
        other => Err(Error::deserialization(format!(
            "expected an argument array, found {}",
            other.type_name()
        ))),
    }
}

/// Textual number form used on the wire.
pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n == f64::INFINITY {
        "Infinity".to_string()
    } else if n == f64::NEG_INFINITY {
        "-Infinity".to_string()
    } else {
        n.to_string()
    }
}

fn parse_number(text: &str) -> Result<f64> {
    match text {
        "NaN" => Ok(f64::NAN),
        "Infinity" => Ok(f64::INFINITY),
        "-Infinity" => Ok(f64::NEG_INFINITY),
        other => {
            // Rust's float parser also accepts "inf"/"nan" spellings; only the
            // canonical forms above are valid here.
            let finite = other.parse::<f64>().ok().filter(|n| n.is_finite());
            finite.ok_or_else(|| Error::deserialization(format!("invalid number {:?}", other)))
        }
    }
}

fn encode(value: &Value) -> Json {
    match value {
        Value::Undefined => json!({ TYPE: "undefined" }),
        Value::Null => json!({ TYPE: "null" }),
        Value::Bool(b) => json!({ TYPE: "boolean", VALUE: b }),
        Value::Number(n) => json!({ TYPE: "number", VALUE: format_number(*n) }),
        Value::String(s) => json!({ TYPE: "string", VALUE: s }),
        Value::Array(items) => {
            let nodes: Vec<Json> = items.iter().map(encode).collect();
            json!({ TYPE: "array", VALUE: nodes })
        }
        Value::Object(map) => {
            let nodes: Map<String, Json> = map.iter().map(|(k, v)| (k.clone(), encode(v))).collect();
            json!({ TYPE: "object", VALUE: nodes })
        }
        Value::Error(err) => {
            let mut body = Map::new();
            if let Some(kind) = &err.kind {
                body.insert("name".to_string(), Json::String(kind.clone()));
            }
            body.insert("message".to_string(), Json::String(err.message.clone()));
            json!({ TYPE: "error", VALUE: body })
        }
        Value::Date(ms) => json!({ TYPE: "date", VALUE: ms }),
    }
}

fn decode(node: &Json, level: usize) -> Result<Value> {
    let fields = node
        .as_object()
        .ok_or_else(|| Error::deserialization("wire node is not an object"))?;
    let tag = fields
        .get(TYPE)
        .and_then(Json::as_str)
        .ok_or_else(|| Error::deserialization("wire node has no type tag"))?;
    let payload = fields.get(VALUE);

    match tag {
        "undefined" => Ok(Value::Undefined),
        "null" => Ok(Value::Null),
        "boolean" => payload
            .and_then(Json::as_bool)
            .map(Value::Bool)
            .ok_or_else(|| invalid_payload(tag)),
        "number" => {
            let text = payload.and_then(Json::as_str).ok_or_else(|| invalid_payload(tag))?;
            parse_number(text).map(Value::Number)
        }
        "string" => payload
            .and_then(Json::as_str)
            .map(|s| Value::String(s.to_string()))
            .ok_or_else(|| invalid_payload(tag)),
        "array" => {
            let level = enter(level)?;
            let items = payload.and_then(Json::as_array).ok_or_else(|| invalid_payload(tag))?;
            items
                .iter()
                .map(|item| decode(item, level))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array)
        }
        "object" => {
            let level = enter(level)?;
            let entries = payload.and_then(Json::as_object).ok_or_else(|| invalid_payload(tag))?;
            entries
                .iter()
                .map(|(k, v)| decode(v, level).map(|v| (k.clone(), v)))
                .collect::<Result<BTreeMap<_, _>>>()
                .map(Value::Object)
        }
        "error" => {
            let body = payload.and_then(Json::as_object).ok_or_else(|| invalid_payload(tag))?;
            let message = body
                .get("message")
                .and_then(Json::as_str)
                .ok_or_else(|| Error::deserialization("error node has no message"))?;
            let kind = match body.get("name") {
                None => None,
                Some(Json::String(name)) => Some(name.clone()),
                Some(_) => return Err(Error::deserialization("error name is not a string")),
            };
            Ok(Value::Error(ErrorValue {
                message: message.to_string(),
                kind,
            }))
        }
        "date" => payload
            .and_then(Json::as_i64)
            .map(Value::Date)
            .ok_or_else(|| invalid_payload(tag)),
        other => Err(Error::deserialization(format!("unknown type tag {:?}", other))),
    }
}

fn enter(level: usize) -> Result<usize> {
    if level >= MAX_DEPTH {
        return Err(Error::deserialization(format!(
            "payload nests deeper than {} levels",
            MAX_DEPTH
        )));
    }
    Ok(level + 1)
}

fn invalid_payload(tag: &str) -> Error {
    Error::deserialization(format!("missing or invalid payload for {:?}", tag))
}
