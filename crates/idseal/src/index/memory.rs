//! [`InMemoryIdentifierStore`]: process-local reference store.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{IdentifierStore, MatchQuery, StoreError};
use crate::envelope::StoredValue;

/// Raw stored identifiers keyed by record ID.
///
/// [`IdentifierStore::upsert_unique`] and [`IdentifierStore::replace_if`]
/// re-run the match under the write lock, so concurrent writers of the same
/// identifier cannot both commit.
#[derive(Clone, Debug, Default)]
pub struct InMemoryIdentifierStore {
    inner: Arc<RwLock<BTreeMap<String, String>>>,
}

impl InMemoryIdentifierStore {
    /// Create a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a raw value without any checks, e.g. a legacy plaintext row.
    pub async fn seed(&self, record_id: &str, raw: &str) {
        self.inner
            .write()
            .await
            .insert(record_id.to_owned(), raw.to_owned());
    }
}

fn first_match(rows: &BTreeMap<String, String>, query: &MatchQuery) -> Option<String> {
    rows.iter()
        .find(|(_, stored)| query.matches(stored))
        .map(|(id, _)| id.clone())
}

#[async_trait]
impl IdentifierStore for InMemoryIdentifierStore {
    async fn find_match(&self, query: &MatchQuery) -> Result<Option<String>, StoreError> {
        Ok(first_match(&*self.inner.read().await, query))
    }

    async fn upsert_unique(
        &self,
        record_id: &str,
        stored: String,
        query: &MatchQuery,
    ) -> Result<(), StoreError> {
        let mut rows = self.inner.write().await;
        let conflict = rows
            .iter()
            .find(|(id, value)| id.as_str() != record_id && query.matches(value))
            .map(|(id, _)| id.clone());
        if let Some(existing) = conflict {
            return Err(StoreError::Conflict(existing));
        }
        rows.insert(record_id.to_owned(), stored);
        Ok(())
    }

    async fn get(&self, record_id: &str) -> Result<Option<String>, StoreError> {
        Ok(self.inner.read().await.get(record_id).cloned())
    }

    async fn legacy_entries(&self) -> Result<Vec<(String, String)>, StoreError> {
        let rows = self.inner.read().await;
        Ok(rows
            .iter()
            .filter(|(_, v)| matches!(StoredValue::classify(v), StoredValue::Legacy(_)))
            .map(|(id, v)| (id.clone(), v.clone()))
            .collect())
    }

    async fn replace_if(
        &self,
        record_id: &str,
        expected: &str,
        stored: String,
        query: &MatchQuery,
    ) -> Result<bool, StoreError> {
        let mut rows = self.inner.write().await;
        if rows.get(record_id).map(String::as_str) != Some(expected) {
            return Ok(false);
        }
        let conflict = rows
            .iter()
            .find(|(id, value)| id.as_str() != record_id && query.matches(value))
            .map(|(id, _)| id.clone());
        if let Some(existing) = conflict {
            return Err(StoreError::Conflict(existing));
        }
        rows.insert(record_id.to_owned(), stored);
        Ok(true)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.inner.read().await.len())
    }
}
