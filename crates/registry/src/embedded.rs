//! Snapshot compiled into the binary, used when neither cache nor network is
//! available.

use crate::types::{PayloadShape, Registry};

const BUNDLED_REGISTRY: &str = include_str!("../assets/bundled-registry.json");

/// The ship-with-the-tool catalog. Never fails; a malformed asset yields an
/// empty registry and an error log.
pub fn bundled_registry() -> Registry {
    match serde_json::from_str::<PayloadShape>(BUNDLED_REGISTRY) {
        Ok(shape) => shape.into(),
        Err(e) => {
            tracing::error!(error = %e, "bundled registry snapshot is malformed");
            Registry::default()
        },
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_parses_and_is_self_consistent() {
        let reg = bundled_registry();
        assert!(reg.prompts.len() >= 5);
        assert!(!reg.bundles.is_empty());
        for bundle in &reg.bundles {
            assert_eq!(
                reg.prompts_for_bundle(bundle).len(),
                bundle.prompts.len(),
                "bundle {} references unknown prompts",
                bundle.id
            );
        }
    }

    #[test]
    fn snapshot_ids_are_unique() {
        let reg = bundled_registry();
        let mut ids: Vec<_> = reg.prompts.iter().map(|p| p.id.as_str()).collect();
        ids.sort_unstable();
        let before = ids.len();
        ids.dedup();
        assert_eq!(before, ids.len());
    }
}
