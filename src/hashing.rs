//! Hashing - SHA-256 over rendered labels and their inputs
//!
//! The job hash identifies *what was asked for* and is stable across runs.
//! The manifest hash covers the whole compiled record, timestamp included.

use sha2::{Sha256, Digest};
use serde::Serialize;
use serde_json::{Value, to_string};

use crate::label::LabelSpec;

/// Compute SHA-256 hash of bytes, return hex string
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Convert to canonical JSON (sorted keys, no whitespace)
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let v: Value = serde_json::to_value(value)?;
    to_string(&sort_value(&v))
}

fn sort_value(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(entries.into_iter().map(|(k, v)| (k.clone(), sort_value(v))).collect())
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_value).collect()),
        _ => v.clone(),
    }
}

/// Compute manifest hash for a compiled label
pub fn compute_manifest_hash<T: Serialize>(manifest: &T) -> Result<String, serde_json::Error> {
    let canonical = canonical_json(manifest)?;
    Ok(sha256_hex(canonical.as_bytes()))
}

/// job_hash = sha256(template_id:template_version:canonical_spec:engine_version)
///
/// Field order inside the spec is part of the label (it is the render
/// order), so fields are hashed as an ordered list rather than an object.
pub fn compute_job_hash(
    template_id: &str,
    template_version: &str,
    spec: &LabelSpec,
    engine_version: &str,
) -> Result<String, serde_json::Error> {
    let mut payload = serde_json::to_value(spec)?;
    if let Value::Object(map) = &mut payload {
        let ordered: Vec<Value> = spec
            .fields
            .iter()
            .map(|(k, v)| Value::Array(vec![Value::from(k), Value::from(v)]))
            .collect();
        map.insert("fields".to_string(), Value::Array(ordered));
    }
    let combined = format!(
        "{}:{}:{}:{}",
        template_id,
        template_version,
        canonical_json(&payload)?,
        engine_version
    );
    Ok(sha256_hex(combined.as_bytes()))
}

mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{:02x}", b)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::CanvasSize;
    use serde_json::json;

    #[test]
    fn test_canonical_json_sorted() {
        let obj = json!({"z": 1, "a": 2, "m": 3});
        assert_eq!(canonical_json(&obj).unwrap(), r#"{"a":2,"m":3,"z":1}"#);
    }

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_job_hash_depends_on_field_order() {
        let a = LabelSpec::new(CanvasSize::new(300, 200)).with_field("SKU", "1").with_field("Bin", "2");
        let b = LabelSpec::new(CanvasSize::new(300, 200)).with_field("Bin", "2").with_field("SKU", "1");

        let ha = compute_job_hash("adhoc", "0", &a, "1.0.0").unwrap();
        assert_eq!(ha, compute_job_hash("adhoc", "0", &a, "1.0.0").unwrap());
        assert_ne!(ha, compute_job_hash("adhoc", "0", &b, "1.0.0").unwrap());
    }
}
