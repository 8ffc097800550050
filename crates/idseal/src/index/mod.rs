//! Deterministic uniqueness index over sealed identifiers.
//!
//! A candidate plaintext `p` is a duplicate if any stored value either starts
//! with `"<fingerprint(p)>:"` (a sealed row) or equals `p` exactly (a legacy
//! row). Nothing is decrypted to answer the question.
//!
//! # Consistency
//!
//! [`UniquenessIndex::check`] is advisory: two writers racing on the same new
//! identifier can both observe "available". Only the store's
//! [`IdentifierStore::upsert_unique`] closes that race, and every store
//! implementation must evaluate the match and the write atomically.

pub mod memory;

pub use memory::InMemoryIdentifierStore;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use crate::codec::{CodecError, IdentifierCodec, OpenError, Opened};
use crate::envelope::lookup_prefix;

/// Errors produced by an [`IdentifierStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// Another record already holds a matching identifier.
    #[error("identifier already held by record {0}")]
    Conflict(String),

    /// The backing store could not be reached.
    #[error("identifier store unavailable: {0}")]
    Unavailable(String),
}

/// Errors produced by [`UniquenessIndex`] write paths.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The identifier is already registered to a different record.
    #[error("identifier already registered")]
    Duplicate,

    /// Empty identifiers are never registered.
    #[error("identifier must not be empty")]
    EmptyIdentifier,

    /// Sealing failed.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Raw-string match conditions for one candidate identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchQuery {
    /// `"<fingerprint>:"`; matches any sealed row of the same plaintext.
    pub prefix: String,
    /// Exact plaintext; matches legacy rows. `None` restricts the query to sealed rows.
    pub legacy_exact: Option<String>,
}

impl MatchQuery {
    /// Returns `true` if a raw stored value satisfies this query.
    pub fn matches(&self, stored: &str) -> bool {
        stored.starts_with(&self.prefix) || self.legacy_exact.as_deref() == Some(stored)
    }
}

/// Storage seam for protected identifier columns.
///
/// Values are the raw stored strings: sealed envelopes or legacy plaintext.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentifierStore: Send + Sync {
    /// Return the ID of any record whose stored value satisfies `query`.
    async fn find_match(&self, query: &MatchQuery) -> Result<Option<String>, StoreError>;

    /// Set `record_id`'s stored value, failing with [`StoreError::Conflict`]
    /// if a *different* record satisfies `query`. The match and the write must
    /// be atomic.
    async fn upsert_unique(
        &self,
        record_id: &str,
        stored: String,
        query: &MatchQuery,
    ) -> Result<(), StoreError>;

    /// Fetch the raw stored value for `record_id`.
    async fn get(&self, record_id: &str) -> Result<Option<String>, StoreError>;

    /// All `(record_id, plaintext)` pairs still stored without an envelope.
    async fn legacy_entries(&self) -> Result<Vec<(String, String)>, StoreError>;

    /// Set `record_id`'s stored value only if it still equals `expected`.
    ///
    /// Returns `Ok(false)` without writing if the row has changed. Fails with
    /// [`StoreError::Conflict`] if a *different* record satisfies `query`. The
    /// comparison, the match and the write must be atomic.
    async fn replace_if(
        &self,
        record_id: &str,
        expected: &str,
        stored: String,
        query: &MatchQuery,
    ) -> Result<bool, StoreError>;

    /// Number of stored identifiers.
    async fn count(&self) -> Result<usize, StoreError>;
}

/// Result of a uniqueness check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Uniqueness {
    /// No stored record holds the candidate.
    Available,
    /// `record_id` already holds the candidate.
    Duplicate {
        /// The matching record.
        record_id: String,
    },
}

/// Outcome of the legacy rewrite pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Legacy rows rewritten as sealed envelopes.
    pub resealed: usize,
    /// Legacy rows left in place: the identifier is already sealed under
    /// another record, or the row was rewritten while the pass ran.
    pub skipped: usize,
}

/// Registration-time duplicate detection plus the sealed write and read paths.
#[derive(Clone)]
pub struct UniquenessIndex {
    codec: Arc<IdentifierCodec>,
    store: Arc<dyn IdentifierStore>,
}

impl UniquenessIndex {
    /// Create an index over `store` using `codec` for fingerprints and sealing.
    pub fn new(codec: Arc<IdentifierCodec>, store: Arc<dyn IdentifierStore>) -> Self {
        Self { codec, store }
    }

    /// Number of identifiers in the backing store.
    ///
    /// # Errors
    ///
    /// Propagates [`StoreError`] from the store.
    pub async fn count(&self) -> Result<usize, StoreError> {
        self.store.count().await
    }

    /// Build the match conditions for `candidate`.
    pub fn query_for(&self, candidate: &str) -> MatchQuery {
        MatchQuery {
            prefix: lookup_prefix(&self.codec.fingerprint(candidate)),
            legacy_exact: Some(candidate.to_owned()),
        }
    }

    /// Check whether `candidate` is already registered.
    ///
    /// An empty candidate is always [`Uniqueness::Available`] and the store is
    /// not consulted.
    ///
    /// # Errors
    ///
    /// Propagates [`StoreError`] from the store.
    pub async fn check(&self, candidate: &str) -> Result<Uniqueness, StoreError> {
        if candidate.is_empty() {
            return Ok(Uniqueness::Available);
        }
        let found = self.store.find_match(&self.query_for(candidate)).await?;
        Ok(match found {
            Some(record_id) => Uniqueness::Duplicate { record_id },
            None => Uniqueness::Available,
        })
    }

    /// Seal `plaintext` and store it under `record_id`, rejecting identifiers
    /// already held by a different record.
    ///
    /// Re-registering the same identifier for the same record re-seals it with
    /// a fresh nonce. Returns the stored value.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Duplicate`] if another record holds the identifier,
    /// either at check time or when the store commits.
    pub async fn register(&self, record_id: &str, plaintext: &str) -> Result<String, IndexError> {
        if plaintext.is_empty() {
            return Err(IndexError::EmptyIdentifier);
        }
        let query = self.query_for(plaintext);
        if let Some(existing) = self.store.find_match(&query).await? {
            if existing != record_id {
                warn!(record_id, existing = %existing, "rejected duplicate identifier");
                return Err(IndexError::Duplicate);
            }
        }

        let stored = self.codec.seal_value(plaintext)?;
        match self.store.upsert_unique(record_id, stored.clone(), &query).await {
            Ok(()) => {
                info!(record_id, "identifier registered");
                Ok(stored)
            }
            Err(StoreError::Conflict(existing)) => {
                warn!(record_id, existing = %existing, "duplicate identifier detected at commit");
                Err(IndexError::Duplicate)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Open the identifier stored under `record_id`.
    ///
    /// Returns `None` if the record has no stored identifier.
    ///
    /// # Errors
    ///
    /// Propagates [`StoreError`] from the store. Open failures are returned in
    /// the inner result, not as an error.
    pub async fn read(
        &self,
        record_id: &str,
    ) -> Result<Option<Result<Opened, OpenError>>, StoreError> {
        let stored = self.store.get(record_id).await?;
        Ok(stored.map(|s| self.codec.try_open(&s)))
    }

    /// Rewrite every legacy plaintext row as a sealed envelope.
    ///
    /// Each row is rewritten only if it still holds the plaintext that was
    /// read, so a registration racing the pass is never overwritten. A legacy
    /// row whose identifier is already sealed under another record is left in
    /// place and counted as skipped; resolving it needs a human.
    ///
    /// # Errors
    ///
    /// Stops at the first [`StoreError`] or [`CodecError`]; rows rewritten
    /// before the failure stay rewritten.
    pub async fn reseal_legacy(&self) -> Result<MigrationReport, IndexError> {
        let mut report = MigrationReport::default();
        for (record_id, plaintext) in self.store.legacy_entries().await? {
            let sealed_only = MatchQuery {
                prefix: lookup_prefix(&self.codec.fingerprint(&plaintext)),
                legacy_exact: None,
            };
            let stored = self.codec.seal_value(&plaintext)?;
            match self
                .store
                .replace_if(&record_id, &plaintext, stored, &sealed_only)
                .await
            {
                Ok(true) => report.resealed += 1,
                Ok(false) => {
                    info!(record_id = %record_id, "legacy row changed during migration; skipping");
                    report.skipped += 1;
                }
                Err(StoreError::Conflict(existing)) => {
                    warn!(record_id = %record_id, existing = %existing, "legacy identifier already sealed elsewhere; skipping");
                    report.skipped += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
        info!(
            resealed = report.resealed,
            skipped = report.skipped,
            "legacy identifier migration finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::tests::test_codec;
    use crate::codec::ValueOrigin;
    use mockall::predicate::*;

    fn index_with(store: InMemoryIdentifierStore) -> UniquenessIndex {
        UniquenessIndex::new(Arc::new(test_codec()), Arc::new(store))
    }

    #[tokio::test]
    async fn sealed_record_is_found_and_neighbour_is_not() {
        let index = index_with(InMemoryIdentifierStore::new());
        index.register("user-1", "900101-01-1234").await.unwrap();

        assert_eq!(
            index.check("900101-01-1234").await.unwrap(),
            Uniqueness::Duplicate {
                record_id: "user-1".into()
            }
        );
        assert_eq!(
            index.check("900101-01-1235").await.unwrap(),
            Uniqueness::Available
        );
    }

    #[tokio::test]
    async fn legacy_record_is_found_by_exact_match() {
        let store = InMemoryIdentifierStore::new();
        store.seed("legacy-1", "901010101234").await;
        let index = index_with(store);
        assert!(matches!(
            index.check("901010101234").await.unwrap(),
            Uniqueness::Duplicate { .. }
        ));
        assert_eq!(
            index.check("90101010123").await.unwrap(),
            Uniqueness::Available
        );
    }

    #[tokio::test]
    async fn empty_candidate_skips_store() {
        let mut store = MockIdentifierStore::new();
        store.expect_find_match().never();
        let index = UniquenessIndex::new(Arc::new(test_codec()), Arc::new(store));
        assert_eq!(index.check("").await.unwrap(), Uniqueness::Available);
    }

    #[tokio::test]
    async fn check_queries_prefix_and_exact_value() {
        let codec = Arc::new(test_codec());
        let expected = MatchQuery {
            prefix: format!("{}:", codec.fingerprint("900101-01-1234")),
            legacy_exact: Some("900101-01-1234".into()),
        };
        let mut store = MockIdentifierStore::new();
        store
            .expect_find_match()
            .with(eq(expected))
            .times(1)
            .returning(|_| Ok(None));
        let index = UniquenessIndex::new(codec, Arc::new(store));
        assert_eq!(
            index.check("900101-01-1234").await.unwrap(),
            Uniqueness::Available
        );
    }

    #[tokio::test]
    async fn duplicate_registration_rejected() {
        let index = index_with(InMemoryIdentifierStore::new());
        index.register("user-1", "900101-01-1234").await.unwrap();
        let err = index.register("user-2", "900101-01-1234").await.unwrap_err();
        assert!(matches!(err, IndexError::Duplicate));
        assert_eq!(index.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn same_record_may_reseal_its_identifier() {
        let index = index_with(InMemoryIdentifierStore::new());
        let first = index.register("user-1", "900101-01-1234").await.unwrap();
        let second = index.register("user-1", "900101-01-1234").await.unwrap();
        assert_ne!(first, second);
        assert_eq!(index.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn empty_identifier_not_registered() {
        let index = index_with(InMemoryIdentifierStore::new());
        assert!(matches!(
            index.register("user-1", "").await.unwrap_err(),
            IndexError::EmptyIdentifier
        ));
    }

    #[tokio::test]
    async fn commit_time_conflict_maps_to_duplicate() {
        // Simulates a concurrent writer committing between check and write.
        let mut store = MockIdentifierStore::new();
        store.expect_find_match().returning(|_| Ok(None));
        store
            .expect_upsert_unique()
            .returning(|_, _, _| Err(StoreError::Conflict("user-racer".into())));
        let index = UniquenessIndex::new(Arc::new(test_codec()), Arc::new(store));
        assert!(matches!(
            index.register("user-1", "900101-01-1234").await.unwrap_err(),
            IndexError::Duplicate
        ));
    }

    #[tokio::test]
    async fn store_outage_propagates() {
        let mut store = MockIdentifierStore::new();
        store
            .expect_find_match()
            .returning(|_| Err(StoreError::Unavailable("connection refused".into())));
        let index = UniquenessIndex::new(Arc::new(test_codec()), Arc::new(store));
        assert!(matches!(
            index.check("900101-01-1234").await.unwrap_err(),
            StoreError::Unavailable(_)
        ));
    }

    #[tokio::test]
    async fn read_reports_origin_and_failures() {
        let store = InMemoryIdentifierStore::new();
        store.seed("legacy-1", "901010101234").await;
        store.seed("broken-1", "deadbeef:AAAA").await;
        let index = index_with(store);
        index.register("user-1", "900101-01-1234").await.unwrap();

        let sealed = index.read("user-1").await.unwrap().unwrap().unwrap();
        assert_eq!(sealed.plaintext, "900101-01-1234");
        assert_eq!(sealed.origin, ValueOrigin::Sealed);

        let legacy = index.read("legacy-1").await.unwrap().unwrap().unwrap();
        assert_eq!(legacy.origin, ValueOrigin::Legacy);

        assert!(index.read("broken-1").await.unwrap().unwrap().is_err());
        assert!(index.read("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reseal_legacy_rewrites_rows() {
        let store = InMemoryIdentifierStore::new();
        store.seed("legacy-1", "901010101234").await;
        store.seed("legacy-2", "880202025678").await;
        let index = index_with(store);

        let report = index.reseal_legacy().await.unwrap();
        assert_eq!(report, MigrationReport { resealed: 2, skipped: 0 });

        let opened = index.read("legacy-1").await.unwrap().unwrap().unwrap();
        assert_eq!(opened.plaintext, "901010101234");
        assert_eq!(opened.origin, ValueOrigin::Sealed);
        // Still detected as a duplicate once sealed.
        assert!(matches!(
            index.check("880202025678").await.unwrap(),
            Uniqueness::Duplicate { .. }
        ));
        assert_eq!(
            index.reseal_legacy().await.unwrap(),
            MigrationReport::default()
        );
    }

    #[tokio::test]
    async fn reseal_legacy_skips_identifier_sealed_elsewhere() {
        let store = InMemoryIdentifierStore::new();
        store.seed("legacy-1", "901010101234").await;
        store.seed("legacy-2", "901010101234").await;
        let index = index_with(store);

        let report = index.reseal_legacy().await.unwrap();
        assert_eq!(report, MigrationReport { resealed: 1, skipped: 1 });
    }

    #[tokio::test]
    async fn reseal_legacy_does_not_overwrite_concurrent_registration() {
        let mut store = MockIdentifierStore::new();
        store
            .expect_legacy_entries()
            .returning(|| Ok(vec![("r1".into(), "901010101234".into())]));
        // The row was re-registered with a new identifier after it was listed.
        store
            .expect_replace_if()
            .withf(|id, expected, _, query| {
                id == "r1" && expected == "901010101234" && query.legacy_exact.is_none()
            })
            .times(1)
            .returning(|_, _, _, _| Ok(false));
        let index = UniquenessIndex::new(Arc::new(test_codec()), Arc::new(store));
        assert_eq!(
            index.reseal_legacy().await.unwrap(),
            MigrationReport { resealed: 0, skipped: 1 }
        );
    }

    #[tokio::test]
    async fn reseal_legacy_keeps_row_registered_mid_pass() {
        let store = InMemoryIdentifierStore::new();
        store.seed("r1", "901010101234").await;
        let listed = store.legacy_entries().await.unwrap();
        let index = index_with(store.clone());
        index.register("r1", "880202025678").await.unwrap();

        let (record_id, plaintext) = &listed[0];
        let query = MatchQuery {
            prefix: lookup_prefix(&test_codec().fingerprint(plaintext)),
            legacy_exact: None,
        };
        let stale = test_codec().seal_value(plaintext).unwrap();
        assert!(!store
            .replace_if(record_id, plaintext, stale, &query)
            .await
            .unwrap());

        let opened = index.read("r1").await.unwrap().unwrap().unwrap();
        assert_eq!(opened.plaintext, "880202025678");
    }
}
