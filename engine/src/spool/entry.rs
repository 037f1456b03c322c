//! The unit of work stored in a spool.

use std::fmt;
use std::path::Path;

/// Error returned by [`Entry::encode`] / [`Entry::decode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecError(pub String);

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for CodecError {}

/// A work item that can live in a storage and be mirrored to disk.
///
/// Encoding is explicit: the storage never inspects the bytes, it only
/// writes them to `<payload file name>.dat` and hands them back to
/// [`Entry::decode`] during restore.
pub trait Entry: Clone + PartialEq + Send + Sync + 'static {
    /// Stable identity, unique within one storage.
    fn id(&self) -> u64;

    /// The file this entry stands for, if any.
    fn payload_file(&self) -> Option<&Path>;

    /// Serialize the entry metadata (not the payload contents).
    fn encode(&self) -> Result<Vec<u8>, CodecError>;

    /// Rebuild an entry from bytes produced by [`Entry::encode`].
    fn decode(bytes: &[u8]) -> Result<Self, CodecError>;

    /// Called for every entry recovered from disk, before insertion.
    /// Lets id generators move past restored ids.
    fn on_restored(&self) {}

    /// Failed processing attempts recorded on the entry.
    fn attempts(&self) -> u32 {
        0
    }

    /// Record failed processing attempts. Entries that do not persist a
    /// retry budget ignore this.
    fn set_attempts(&mut self, _attempts: u32) {}
}
