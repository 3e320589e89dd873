//! Per-component payload codecs, resolved once at startup.

use std::collections::HashMap;

use crate::error::{PayloadError, RegistryError, RegistryResult};
use crate::{ComponentTypeId, Registry};

/// Encode/decode seam for one component type.
///
/// The replication pipeline never inspects payload contents; implementations
/// of this trait are the only place typed component state meets the wire.
pub trait PayloadCodec {
    /// The consumer-side value type shared by all codecs in one table.
    type Value;

    /// Serializes a value into `out`.
    fn encode(&self, value: &Self::Value, out: &mut Vec<u8>);

    /// Deserializes a payload produced by `encode`.
    fn decode(&self, payload: &[u8]) -> Result<Self::Value, PayloadError>;
}

/// A dispatch table from component type id to its payload codec.
///
/// Built once at startup against a validated [`Registry`]; lookups after
/// that are plain map hits, no runtime type inspection anywhere.
pub struct CodecTable<V> {
    entries: HashMap<ComponentTypeId, Box<dyn PayloadCodec<Value = V>>>,
}

impl<V> CodecTable<V> {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Registers a codec for a component type.
    ///
    /// The component must exist in `registry`, and each id can only be
    /// registered once.
    pub fn register(
        &mut self,
        registry: &Registry,
        id: ComponentTypeId,
        codec: Box<dyn PayloadCodec<Value = V>>,
    ) -> RegistryResult<()> {
        if !registry.contains(id) {
            return Err(RegistryError::UnregisteredComponent { id });
        }
        if self.entries.contains_key(&id) {
            return Err(RegistryError::DuplicateComponentId { id });
        }
        self.entries.insert(id, codec);
        Ok(())
    }

    /// Returns the codec for a component type, if registered.
    #[must_use]
    pub fn get(&self, id: ComponentTypeId) -> Option<&dyn PayloadCodec<Value = V>> {
        self.entries.get(&id).map(Box::as_ref)
    }

    /// Encodes a value through the registered codec.
    pub fn encode(&self, id: ComponentTypeId, value: &V, out: &mut Vec<u8>) -> Result<(), PayloadError> {
        let codec = self
            .get(id)
            .ok_or(PayloadError::UnknownComponent { component: id })?;
        codec.encode(value, out);
        Ok(())
    }

    /// Decodes a payload through the registered codec.
    pub fn decode(&self, id: ComponentTypeId, payload: &[u8]) -> Result<V, PayloadError> {
        let codec = self
            .get(id)
            .ok_or(PayloadError::UnknownComponent { component: id })?;
        codec.decode(payload)
    }
}

impl<V> Default for CodecTable<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> std::fmt::Debug for CodecTable<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecTable")
            .field("components", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ComponentDef;

    fn cid(value: u16) -> ComponentTypeId {
        ComponentTypeId::new(value).unwrap()
    }

    struct U32Codec(ComponentTypeId);

    impl PayloadCodec for U32Codec {
        type Value = u32;

        fn encode(&self, value: &u32, out: &mut Vec<u8>) {
            out.extend_from_slice(&value.to_le_bytes());
        }

        fn decode(&self, payload: &[u8]) -> Result<u32, PayloadError> {
            let bytes: [u8; 4] = payload
                .try_into()
                .map_err(|_| PayloadError::Malformed { component: self.0 })?;
            Ok(u32::from_le_bytes(bytes))
        }
    }

    fn registry_one() -> Registry {
        Registry::new(vec![ComponentDef::new(cid(1), "counter")]).unwrap()
    }

    #[test]
    fn register_and_roundtrip() {
        let registry = registry_one();
        let mut table = CodecTable::new();
        table
            .register(&registry, cid(1), Box::new(U32Codec(cid(1))))
            .unwrap();

        let mut out = Vec::new();
        table.encode(cid(1), &42, &mut out).unwrap();
        assert_eq!(table.decode(cid(1), &out).unwrap(), 42);
    }

    #[test]
    fn register_rejects_unknown_component() {
        let registry = registry_one();
        let mut table = CodecTable::new();
        let err = table
            .register(&registry, cid(9), Box::new(U32Codec(cid(9))))
            .unwrap_err();
        assert!(matches!(err, RegistryError::UnregisteredComponent { .. }));
    }

    #[test]
    fn register_rejects_duplicate() {
        let registry = registry_one();
        let mut table = CodecTable::new();
        table
            .register(&registry, cid(1), Box::new(U32Codec(cid(1))))
            .unwrap();
        let err = table
            .register(&registry, cid(1), Box::new(U32Codec(cid(1))))
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateComponentId { .. }));
    }

    #[test]
    fn decode_unknown_component_errors() {
        let table: CodecTable<u32> = CodecTable::new();
        let err = table.decode(cid(1), &[]).unwrap_err();
        assert!(matches!(err, PayloadError::UnknownComponent { .. }));
    }

    #[test]
    fn decode_malformed_payload_errors() {
        let registry = registry_one();
        let mut table = CodecTable::new();
        table
            .register(&registry, cid(1), Box::new(U32Codec(cid(1))))
            .unwrap();
        let err = table.decode(cid(1), &[1, 2]).unwrap_err();
        assert!(matches!(err, PayloadError::Malformed { .. }));
    }
}
