//! Identifier generation.
//!
//! Two modes: content-addressed ids are a BLAKE3 digest of a value's wire
//! form (same input, same id), random ids are UUIDv4 for correlating
//! one-off requests.

use crate::network::NodeAddress;
use crate::serialization::serialize;
use crate::value::Value;

/// Length of a short node id (SID).
pub const SHORT_ID_LEN: usize = 5;

/// Deterministic id derived from `seed`.
pub fn content_id(seed: &Value) -> String {
    blake3::hash(serialize(seed).as_bytes()).to_hex().to_string()
}

/// Collision-resistant id with no input dependency.
pub fn random_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Content-addressed when `seed` is given, random otherwise.
pub fn generate(seed: Option<&Value>) -> String {
    match seed {
        Some(seed) => content_id(seed),
        None => random_id(),
    }
}

/// Node id (NID): content id of the node's `{ip, port}`.
pub fn node_id(address: &NodeAddress) -> String {
    content_id(&address.to_value())
}

/// Short id (SID): the first few characters of a NID.
pub fn short_id(nid: &str) -> String {
    nid.chars().take(SHORT_ID_LEN).collect()
}
