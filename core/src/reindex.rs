//! The live index snapshot and its serialized rebuild.

use crate::capability::{Capabilities, TranslatorCache};
use crate::config::PipelineConfig;
use crate::index::build_index;
use crate::persist::{IndexMeta, Store};
use crate::search::Corpus;
use anyhow::Result;
use parking_lot::RwLock;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct RebuildReport {
    pub num_docs: usize,
    pub num_terms: usize,
    pub avgdl: f32,
    pub meta: IndexMeta,
}

/// Readers take cheap snapshots; a rebuild swaps in a whole new corpus.
pub struct IndexHandle {
    current: RwLock<Arc<Corpus>>,
    rebuild: tokio::sync::Mutex<()>,
}

impl IndexHandle {
    pub fn new(corpus: Corpus) -> Self {
        Self { current: RwLock::new(Arc::new(corpus)), rebuild: tokio::sync::Mutex::new(()) }
    }

    pub fn empty(config: &PipelineConfig) -> Self {
        Self::new(Corpus::empty(config.bm25_k1, config.bm25_b))
    }

    /// Start from whatever compiled index the store holds.
    pub fn load(store: &Store, config: &PipelineConfig) -> Result<Self> {
        match store.load_corpus()? {
            Some(corpus) => {
                tracing::info!(num_docs = corpus.index.num_docs(), "loaded stored index");
                Ok(Self::new(corpus))
            }
            None => Ok(Self::empty(config)),
        }
    }

    pub fn snapshot(&self) -> Arc<Corpus> {
        self.current.read().clone()
    }

    pub fn replace(&self, corpus: Corpus) {
        *self.current.write() = Arc::new(corpus);
    }

    /// Full rebuild from the stored articles. Concurrent calls run one after
    /// another; readers keep the previous snapshot until the swap.
    pub async fn rebuild(&self, store: &Store, caps: &Capabilities, config: &PipelineConfig) -> Result<RebuildReport> {
        let _guard = self.rebuild.lock().await;
        let articles = store.load_articles()?;
        let mut translators = TranslatorCache::new();
        let (index, documents) = build_index(&articles, caps, &mut translators, config.bm25_k1, config.bm25_b).await;
        let corpus = Corpus::new(index, documents);
        let meta = store.save_corpus(&corpus)?;
        let report = RebuildReport {
            num_docs: corpus.index.num_docs(),
            num_terms: corpus.index.vocab.len(),
            avgdl: corpus.index.avgdl,
            meta,
        };
        self.replace(corpus);
        tracing::info!(num_docs = report.num_docs, num_terms = report.num_terms, "index rebuilt");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::article;

    #[tokio::test]
    async fn rebuild_swaps_snapshot_and_persists() {
        let store = Store::temporary().unwrap();
        store.save_articles(&[article("a1", "Shipping", "Orders ship within 3 days domestically.")]).unwrap();
        let config = PipelineConfig::default();
        let handle = IndexHandle::empty(&config);
        let before = handle.snapshot();
        let report = handle.rebuild(&store, &Capabilities::offline(), &config).await.unwrap();
        assert_eq!(report.num_docs, 1);
        assert_eq!(report.meta.num_docs, 1);
        assert!(before.index.is_empty());
        assert_eq!(handle.snapshot().index.num_docs(), 1);

        let reloaded = IndexHandle::load(&store, &config).unwrap();
        assert_eq!(*reloaded.snapshot(), *handle.snapshot());
    }
}
