//! Access to table data for size estimates

use async_trait::async_trait;
use dashmap::DashMap;

use sysdb_common::{AdminResult, Interruptor, TableId};

/// Read access to the documents stored in user tables
#[async_trait]
pub trait NamespaceRepo: Send + Sync {
    /// Approximate number of documents per shard of `table`
    async fn shard_doc_counts(
        &self,
        table: TableId,
        interruptor: &Interruptor,
    ) -> AdminResult<Vec<u64>>;
}

/// Fixed per-shard counts, set by the caller
#[derive(Default)]
pub struct InMemoryNamespaceRepo {
    counts: DashMap<TableId, Vec<u64>>,
}

impl InMemoryNamespaceRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_counts(&self, table: TableId, counts: Vec<u64>) {
        self.counts.insert(table, counts);
    }
}

#[async_trait]
impl NamespaceRepo for InMemoryNamespaceRepo {
    async fn shard_doc_counts(
        &self,
        table: TableId,
        interruptor: &Interruptor,
    ) -> AdminResult<Vec<u64>> {
        interruptor.check()?;
        Ok(self
            .counts
            .get(&table)
            .map(|c| c.value().clone())
            .unwrap_or_else(|| vec![0]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counts_default_to_empty_shard() {
        let repo = InMemoryNamespaceRepo::new();
        let table = TableId::new();
        let interruptor = Interruptor::new();
        assert_eq!(repo.shard_doc_counts(table, &interruptor).await.unwrap(), vec![0]);
        repo.set_counts(table, vec![10, 20]);
        assert_eq!(
            repo.shard_doc_counts(table, &interruptor).await.unwrap(),
            vec![10, 20]
        );
    }
}
