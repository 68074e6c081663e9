//! Content fingerprints.

use log::warn;

use crate::ir::ast::Component;

/// md5 hex digest of the JSON form of `component`.
///
/// Every container in the model is ordered, so equal components always
/// have equal fingerprints.
pub fn fingerprint(component: &Component) -> String {
    let bytes = match serde_json::to_vec(component) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(
                "cannot serialize '{}' for fingerprinting ({}), hashing its debug form",
                component.name, e
            );
            format!("{:?}", component).into_bytes()
        }
    };
    format!("{:x}", md5::compute(bytes))
}
