//! Deterministic registry hashing.

use blake3::Hasher;

use crate::Registry;

/// Computes a deterministic hash for registry compatibility checks.
///
/// The hash is order-sensitive: both ends must register the same components
/// in the same order with the same limits.
#[must_use]
pub fn registry_hash(registry: &Registry) -> u64 {
    let mut hasher = Hasher::new();
    write_u32(&mut hasher, registry.components.len() as u32);

    for component in &registry.components {
        write_u16(&mut hasher, component.id.get());
        write_u32(&mut hasher, component.name.len() as u32);
        hasher.update(component.name.as_bytes());
        write_u64(&mut hasher, component.max_payload_bytes as u64);
    }

    let hash = hasher.finalize();
    let bytes = hash.as_bytes();
    u64::from_le_bytes(bytes[0..8].try_into().unwrap())
}

fn write_u16(hasher: &mut Hasher, value: u16) {
    hasher.update(&value.to_le_bytes());
}

fn write_u32(hasher: &mut Hasher, value: u32) {
    hasher.update(&value.to_le_bytes());
}

fn write_u64(hasher: &mut Hasher, value: u64) {
    hasher.update(&value.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ComponentDef, ComponentTypeId};

    fn cid(value: u16) -> ComponentTypeId {
        ComponentTypeId::new(value).unwrap()
    }

    #[test]
    fn registry_hash_is_stable() {
        let registry = Registry::new(vec![
            ComponentDef::new(cid(1), "transform").max_payload(64),
            ComponentDef::new(cid(2), "health"),
        ])
        .unwrap();

        assert_eq!(registry_hash(&registry), registry_hash(&registry.clone()));
    }

    #[test]
    fn registry_hash_changes_with_component_order() {
        let a = ComponentDef::new(cid(1), "a");
        let b = ComponentDef::new(cid(2), "b");

        let registry_ab = Registry::new(vec![a.clone(), b.clone()]).unwrap();
        let registry_ba = Registry::new(vec![b, a]).unwrap();

        assert_ne!(registry_hash(&registry_ab), registry_hash(&registry_ba));
    }

    #[test]
    fn registry_hash_changes_with_payload_limit() {
        let small = Registry::new(vec![ComponentDef::new(cid(1), "a").max_payload(16)]).unwrap();
        let large = Registry::new(vec![ComponentDef::new(cid(1), "a").max_payload(32)]).unwrap();

        assert_ne!(registry_hash(&small), registry_hash(&large));
    }

    #[test]
    fn registry_hash_changes_with_name() {
        let a = Registry::new(vec![ComponentDef::new(cid(1), "a")]).unwrap();
        let b = Registry::new(vec![ComponentDef::new(cid(1), "b")]).unwrap();

        assert_ne!(registry_hash(&a), registry_hash(&b));
    }

    #[test]
    fn empty_registry_hashes() {
        let registry = Registry::new(Vec::new()).unwrap();
        // Any fixed value is fine; it just has to be deterministic.
        assert_eq!(registry_hash(&registry), registry_hash(&registry.clone()));
    }
}
