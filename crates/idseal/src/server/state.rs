//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use crate::codec::IdentifierCodec;
use crate::index::{IdentifierStore, UniquenessIndex};

/// Application state shared across all request handlers.
///
/// All fields are cheaply cloneable (`Arc`-wrapped or already `Arc`-backed) so
/// that Axum can clone the state for each request without copying key material.
#[derive(Clone)]
pub struct AppState {
    /// Codec holding the configured encryption key and fingerprint mode.
    pub codec: Arc<IdentifierCodec>,
    /// Uniqueness index over the configured identifier store.
    pub index: UniquenessIndex,
}

impl AppState {
    /// Create a new [`AppState`] from a codec and the backing store.
    pub fn new(codec: IdentifierCodec, store: Arc<dyn IdentifierStore>) -> Self {
        let codec = Arc::new(codec);
        Self {
            index: UniquenessIndex::new(codec.clone(), store),
            codec,
        }
    }
}

#[cfg(test)]
impl AppState {
    /// State with the fixed test key and an empty in-memory store.
    pub(crate) fn for_tests() -> Self {
        Self::new(
            crate::codec::tests::test_codec(),
            Arc::new(crate::index::InMemoryIdentifierStore::new()),
        )
    }
}
