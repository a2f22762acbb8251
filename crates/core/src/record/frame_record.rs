use std::sync::Arc;

use crate::record::record_id::RecordId;

/// One captured frame. Immutable once created; cloning shares the payload.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameRecord {
    id: RecordId,
    payload: Arc<[u8]>,
    created_at: u64,
}

impl FrameRecord {
    pub fn new(payload: Vec<u8>, created_at: u64) -> Self {
        Self::with_id(RecordId::new(), payload, created_at)
    }

    pub fn with_id(id: RecordId, payload: Vec<u8>, created_at: u64) -> Self {
        Self {
            id,
            payload: payload.into(),
            created_at,
        }
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    /// Encoded image bytes.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Capture timestamp, unix ms.
    pub fn created_at(&self) -> u64 {
        self.created_at
    }
}
