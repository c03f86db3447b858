/*
 *   Copyright (c) 2022 R3BL LLC
 *   All rights reserved.
 *
 *   Licensed under the Apache License, Version 2.0 (the "License");
 *   you may not use this file except in compliance with the License.
 *   You may obtain a copy of the License at
 *
 *   http://www.apache.org/licenses/LICENSE-2.0
 *
 *   Unless required by applicable law or agreed to in writing, software
 *   distributed under the License is distributed on an "AS IS" BASIS,
 *   WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *   See the License for the specific language governing permissions and
 *   limitations under the License.
 */

//! Payload fingerprinting and change detection.
//!
//! `fingerprint` is a stable structural hash over [`crate::types::Payload`]:
//! object keys are sorted before hashing (so key order in the source JSON
//! never matters), floats are normalized (`-0.0` folds to `0.0`; `NaN` can't
//! occur — `serde_json::Number` can't represent it), and the recursion is
//! bounded by the value's own tree depth, so there is no cycle to guard
//! against once a payload has been deserialized into a `Value`: a `Value`
//! tree is owned and acyclic by construction. We still document this rather
//! than silently relying on it.

use std::collections::{BTreeMap, HashMap};

use sha2::{Digest, Sha256};

use crate::types::Payload;

/// Stable, deterministic digest of a payload's structure and values.
#[must_use]
pub fn fingerprint(payload: &Payload) -> String {
    let mut hasher = Sha256::new();
    hash_value(payload, &mut hasher);
    format!("{:x}", hasher.finalize())
}

fn hash_value(value: &Payload, hasher: &mut Sha256) {
    match value {
        Payload::Null => hasher.update(b"n"),
        Payload::Bool(b) => {
            hasher.update(b"b");
            hasher.update([u8::from(*b)]);
        }
        Payload::Number(n) => {
            hasher.update(b"#");
            // Canonicalize -0.0 to 0.0 so they fingerprint identically.
            let as_f64 = n.as_f64().unwrap_or_default();
            let normalized = if as_f64 == 0.0 { 0.0 } else { as_f64 };
            hasher.update(normalized.to_bits().to_le_bytes());
        }
        Payload::String(s) => {
            hasher.update(b"s");
            hasher.update((s.len() as u64).to_le_bytes());
            hasher.update(s.as_bytes());
        }
        Payload::Array(items) => {
            hasher.update(b"[");
            hasher.update((items.len() as u64).to_le_bytes());
            for item in items {
                hash_value(item, hasher);
            }
            hasher.update(b"]");
        }
        Payload::Object(map) => {
            // Deterministic key order regardless of the map's own iteration
            // order (serde_json may be built with the `preserve_order`
            // feature upstream; we don't rely on it either way).
            let sorted: BTreeMap<&String, &Payload> = map.iter().collect();
            hasher.update(b"{");
            hasher.update((sorted.len() as u64).to_le_bytes());
            for (k, v) in sorted {
                hasher.update((k.len() as u64).to_le_bytes());
                hasher.update(k.as_bytes());
                hash_value(v, hasher);
            }
            hasher.update(b"}");
        }
    }
}

/// Is this payload "empty" for the purposes of the `required` operator?
#[must_use]
pub fn is_empty_payload(payload: &Payload) -> bool {
    match payload {
        Payload::Null => true,
        Payload::String(s) => s.is_empty(),
        Payload::Array(items) => items.is_empty(),
        Payload::Object(map) => map.is_empty(),
        Payload::Bool(_) | Payload::Number(_) => false,
    }
}

/// Per-channel last-request fingerprint / last-response bookkeeping, owned
/// by the dispatch core and keyed by channel id.
#[derive(Debug, Default)]
pub struct PayloadStateStore {
    last_request_fingerprint: HashMap<String, String>,
    last_response: HashMap<String, Payload>,
}

impl PayloadStateStore {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Compares `payload`'s fingerprint against the last *accepted* request
    /// fingerprint for `channel_id`. The first call on a channel always
    /// reports "changed".
    #[must_use]
    pub fn has_changed(&self, channel_id: &str, payload: &Payload) -> bool {
        match self.last_request_fingerprint.get(channel_id) {
            None => true,
            Some(prev) => *prev != fingerprint(payload),
        }
    }

    pub fn record_request(&mut self, channel_id: &str, payload: &Payload) {
        self.last_request_fingerprint
            .insert(channel_id.to_string(), fingerprint(payload));
    }

    pub fn record_response(&mut self, channel_id: &str, payload: Payload) {
        self.last_response.insert(channel_id.to_string(), payload);
    }

    #[must_use]
    pub fn last_response(&self, channel_id: &str) -> Option<&Payload> {
        self.last_response.get(channel_id)
    }

    pub fn forget(&mut self, channel_id: &str) {
        self.last_request_fingerprint.remove(channel_id);
        self.last_response.remove(channel_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fingerprint_is_stable_under_key_reordering() {
        let a = json!({"a": 1, "b": 2});
        let b = json!({"b": 2, "a": 1});
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn fingerprint_distinguishes_different_values() {
        assert_ne!(fingerprint(&json!({"v": 1})), fingerprint(&json!({"v": 2})));
    }

    #[test]
    fn negative_zero_folds_to_zero() {
        let neg_zero = serde_json::Value::from(-0.0_f64);
        let zero = serde_json::Value::from(0.0_f64);
        assert_eq!(fingerprint(&neg_zero), fingerprint(&zero));
    }

    #[test]
    fn first_call_on_channel_is_always_changed() {
        let store = PayloadStateStore::new();
        assert!(store.has_changed("c1", &json!({"v": 1})));
    }

    #[test]
    fn unchanged_after_recording_identical_payload() {
        let mut store = PayloadStateStore::new();
        store.record_request("c1", &json!({"v": 1}));
        assert!(!store.has_changed("c1", &json!({"v": 1})));
        assert!(store.has_changed("c1", &json!({"v": 2})));
    }

    #[test]
    fn required_empty_matches_spec_definitions() {
        assert!(is_empty_payload(&Payload::Null));
        assert!(is_empty_payload(&json!("")));
        assert!(is_empty_payload(&json!([])));
        assert!(is_empty_payload(&json!({})));
        assert!(!is_empty_payload(&json!(0)));
        assert!(!is_empty_payload(&json!(false)));
    }
}
