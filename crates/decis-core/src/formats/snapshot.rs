//! # Snapshot Format
//!
//! Binary serialization for a whole [`DataStore`].
//!
//! Format: Header (5 bytes) + postcard-serialized store.
//! - 4 bytes: Magic ("DECS")
//! - 1 byte: Version
//!
//! Pre-deserialization validation: the size limit and the header are
//! checked before any payload parsing, so corrupted or hostile input
//! cannot trigger unbounded allocation.

use crate::primitives;
use crate::store::DataStore;
use crate::types::DecisError;

/// Minimum valid snapshot size (header only).
const MIN_FILE_SIZE: usize = 5;

// =============================================================================
// FILE HEADER
// =============================================================================

/// The snapshot header precedes all store data.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl SnapshotHeader {
    /// Create a header with the current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    /// Validate magic and version.
    pub fn validate(&self) -> Result<(), DecisError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(DecisError::SerializationError(
                "Invalid magic bytes".to_string(),
            ));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(DecisError::SerializationError(format!(
                "Unsupported version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    /// Write header to bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 5] {
        let mut bytes = [0u8; 5];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    /// Read header from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecisError> {
        if bytes.len() < MIN_FILE_SIZE {
            return Err(DecisError::SerializationError(
                "Header too short".to_string(),
            ));
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        Ok(Self {
            magic,
            version: bytes[4],
        })
    }
}

impl Default for SnapshotHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// SERIALIZATION FUNCTIONS
// =============================================================================

/// Serialize a store to bytes (header + payload).
pub fn store_to_bytes(store: &DataStore) -> Result<Vec<u8>, DecisError> {
    let header = SnapshotHeader::new();
    let payload = postcard::to_stdvec(store)
        .map_err(|e| DecisError::SerializationError(e.to_string()))?;

    let mut result = Vec::with_capacity(MIN_FILE_SIZE + payload.len());
    result.extend_from_slice(&header.to_bytes());
    result.extend_from_slice(&payload);
    Ok(result)
}

/// Deserialize a store from bytes.
///
/// Validates minimum size, maximum payload size, and the header before
/// touching the payload. The restored store's derived state (the
/// `satisfies` inverse sets) is rebuilt after load.
pub fn store_from_bytes(bytes: &[u8]) -> Result<DataStore, DecisError> {
    if bytes.len() < MIN_FILE_SIZE {
        return Err(DecisError::SerializationError(
            "Data too short: minimum 5 bytes required".to_string(),
        ));
    }
    if bytes.len() > primitives::MAX_SNAPSHOT_PAYLOAD_SIZE {
        return Err(DecisError::SerializationError(format!(
            "Data size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            primitives::MAX_SNAPSHOT_PAYLOAD_SIZE
        )));
    }

    let header = SnapshotHeader::from_bytes(bytes)?;
    header.validate()?;

    let payload = &bytes[MIN_FILE_SIZE..];
    let mut store: DataStore = postcard::from_bytes(payload).map_err(|e| {
        DecisError::SerializationError(format!("Failed to deserialize store data: {e}"))
    })?;

    if !store.attributes().is_consistent() || !store.notes().is_consistent() {
        return Err(DecisError::SerializationError(
            "Element store maps are inconsistent".to_string(),
        ));
    }
    store.rebuild_satisfies();
    Ok(store)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{Question, Target};
    use crate::tables::{CaveatRow, CriterionRow, RelationTable};
    use crate::types::{Coord, Domain};

    fn sample_store() -> DataStore {
        let mut store = DataStore::new();
        let mut question = Question::new();
        question.absorb_answers(["Low", "High"]);
        let q = store.add_question(question);
        let other = store.add_question(Question::new());
        store.link_satisfied_by(other, q).expect("link");
        let t = store.add_target(Target::new(Domain::Assessment, Coord::Col(4)));
        let a = store.find_or_create_attribute("Survey frequency");
        store.add_attribute_mapping(q, a).expect("map");
        let note = store.find_or_create_note("interim estimate only", Some("00FFA500"));
        store.add_criterion(CriterionRow {
            question: q,
            target: t,
            threshold: Some(1),
        });
        store.add_caveat(CaveatRow {
            question: q,
            target: t,
            answer: Some(0),
            note,
        });
        store
    }

    #[test]
    fn header_roundtrip() {
        let header = SnapshotHeader::new();
        let restored = SnapshotHeader::from_bytes(&header.to_bytes()).expect("parse header");
        assert_eq!(restored.magic, *primitives::MAGIC_BYTES);
        assert_eq!(restored.version, primitives::FORMAT_VERSION);
    }

    #[test]
    fn bytes_roundtrip_bit_exact() {
        let store = sample_store();
        let bytes1 = store_to_bytes(&store).expect("first serialize");
        let restored = store_from_bytes(&bytes1).expect("deserialize");
        let bytes2 = store_to_bytes(&restored).expect("second serialize");
        assert_eq!(
            bytes1, bytes2,
            "save -> load -> save must produce identical bytes"
        );
    }

    #[test]
    fn roundtrip_restores_derived_state() {
        let store = sample_store();
        let restored = store_from_bytes(&store_to_bytes(&store).expect("serialize"))
            .expect("deserialize");

        assert_eq!(restored.question_count(), store.question_count());
        assert_eq!(restored.criteria().rows(), store.criteria().rows());
        assert_eq!(restored.caveats().rows(), store.caveats().rows());
        // the skipped inverse relation came back
        let q = crate::types::QuestionId(0);
        let other = crate::types::QuestionId(1);
        assert!(restored.question(q).expect("q").satisfies.contains(&other));
    }

    #[test]
    fn invalid_magic_rejected() {
        let mut bytes = store_to_bytes(&sample_store()).expect("serialize");
        bytes[0..4].copy_from_slice(b"XXXX");
        assert!(store_from_bytes(&bytes).is_err());
    }

    #[test]
    fn unsupported_version_rejected() {
        let mut bytes = store_to_bytes(&sample_store()).expect("serialize");
        bytes[4] = primitives::FORMAT_VERSION + 1;
        assert!(store_from_bytes(&bytes).is_err());
    }

    #[test]
    fn truncated_data_rejected() {
        assert!(store_from_bytes(&[]).is_err());
        assert!(store_from_bytes(b"DEC").is_err());
    }
}
