//! Session snapshots.
//!
//! A snapshot bundles both documents and the review state. It travels as an
//! opaque JSON blob next to a locator naming the session, the agent request
//! and a per-session sequence number; callers round-trip the blob without
//! looking inside it.

use serde::{Deserialize, Serialize};
use tensaku_types::{Document, RequestId, SessionId};

use crate::error::Result;
use crate::events::ReviewState;

/// Addresses one snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotLocator {
    pub session: SessionId,
    pub request: RequestId,
    pub sequence: u64,
}

/// Opaque serialized snapshot plus its locator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotBlob {
    pub locator: SnapshotLocator,
    pub data: String,
}

/// What a snapshot blob contains.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct SessionSnapshot {
    pub original: Document,
    pub modified: Document,
    pub state: ReviewState,
}

impl SessionSnapshot {
    pub fn encode(&self, locator: SnapshotLocator) -> Result<SnapshotBlob> {
        Ok(SnapshotBlob {
            locator,
            data: serde_json::to_string(self)?,
        })
    }

    pub fn decode(blob: &SnapshotBlob) -> Result<Self> {
        Ok(serde_json::from_str(&blob.data)?)
    }

    /// Content comparison, ignoring internal ids and versions.
    pub fn same_content(&self, original: &Document, modified: &Document, state: ReviewState) -> bool {
        self.state == state && self.original.content_eq(original) && self.modified.content_eq(modified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tensaku_types::Cell;

    #[test]
    fn test_blob_carries_documents() {
        let snapshot = SessionSnapshot {
            original: Document::new("mem://a", vec![Cell::code("a\n")]),
            modified: Document::new("mem://a", vec![Cell::code("a\n"), Cell::markup("# b")]),
            state: ReviewState::Modified,
        };
        let locator = SnapshotLocator {
            session: SessionId::new(),
            request: RequestId::new(),
            sequence: 3,
        };
        let blob = snapshot.encode(locator).unwrap();
        assert_eq!(blob.locator, locator);

        let decoded = SessionSnapshot::decode(&blob).unwrap();
        assert!(decoded.same_content(&snapshot.original, &snapshot.modified, ReviewState::Modified));
        assert!(!decoded.same_content(&snapshot.original, &snapshot.original, ReviewState::Modified));
        assert!(!decoded.same_content(&snapshot.original, &snapshot.modified, ReviewState::Accepted));
    }

    #[test]
    fn test_garbage_blob_is_an_error() {
        let blob = SnapshotBlob {
            locator: SnapshotLocator {
                session: SessionId::nil(),
                request: RequestId::nil(),
                sequence: 0,
            },
            data: "not json".into(),
        };
        assert!(SessionSnapshot::decode(&blob).is_err());
    }
}
