//! Upload item: the concrete entry used by the spool binary.
//!
//! Metadata is stored as named-field MessagePack, which keeps `.dat` files
//! small and tolerant of added fields.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::entry::{CodecError, Entry};

static ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Allocate the next process-wide item id.
#[inline]
pub fn next_id() -> u64 {
    ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Make sure future ids are greater than `id`.
#[inline]
pub fn observe_id(id: u64) {
    ID_COUNTER.fetch_max(id.saturating_add(1), Ordering::Relaxed);
}

#[inline]
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadItem {
    pub id: u64,
    pub payload: PathBuf,
    #[serde(default)]
    pub data: Value,
    pub enqueued_at: u64,
    #[serde(default)]
    pub attempts: u32,
}

impl UploadItem {
    /// Create an item for `payload` with a freshly allocated id.
    pub fn new(payload: impl Into<PathBuf>) -> Self {
        Self::with_id(next_id(), payload)
    }

    pub fn with_id(id: u64, payload: impl Into<PathBuf>) -> Self {
        Self {
            id,
            payload: payload.into(),
            data: Value::Null,
            enqueued_at: now_ms(),
            attempts: 0,
        }
    }

    /// Attach caller metadata.
    pub fn data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }
}

impl Entry for UploadItem {
    fn id(&self) -> u64 {
        self.id
    }

    fn payload_file(&self) -> Option<&Path> {
        Some(&self.payload)
    }

    fn encode(&self) -> Result<Vec<u8>, CodecError> {
        rmp_serde::to_vec_named(self).map_err(|e| CodecError(e.to_string()))
    }

    fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        rmp_serde::from_slice(bytes).map_err(|e| CodecError(e.to_string()))
    }

    fn on_restored(&self) {
        observe_id(self.id);
    }

    fn attempts(&self) -> u32 {
        self.attempts
    }

    fn set_attempts(&mut self, attempts: u32) {
        self.attempts = attempts;
    }
}
