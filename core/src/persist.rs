use crate::faq::{migrate_faqs, FaqItem};
use crate::index::{Article, InvertedIndex, StoredDoc, INDEX_VERSION};
use crate::persona::Persona;
use crate::search::Corpus;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use time::format_description::well_known::Rfc3339;

const INDEX_KEY: &str = "docIndex:v2";
const DOCS_KEY: &str = "docDocs:v1";
const META_KEY: &str = "docIndex:meta";
const FAQ_KEY: &str = "faqList";
const PERSONA_KEY: &str = "agentPersona:v1";
const ARTICLES_KEY: &str = "docArticles:v1";
const PROFILE_KEY: &str = "agentProfile";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexMeta {
    pub num_docs: u32,
    pub created_at: String,
    pub version: u32,
}

impl IndexMeta {
    pub fn now(num_docs: usize) -> Self {
        let created_at = time::OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default();
        Self { num_docs: num_docs as u32, created_at, version: INDEX_VERSION }
    }
}

/// Key-value store for the compiled index and the authored records.
///
/// The index and stored bodies are bincode blobs; everything an operator
/// might export is JSON.
#[derive(Clone)]
pub struct Store {
    db: sled::Db,
}

impl Store {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let db = sled::open(path).with_context(|| format!("opening store at {}", path.display()))?;
        Ok(Self { db })
    }

    /// In-memory store, dropped with the handle.
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    fn put_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.db.insert(key, bytes)?;
        Ok(())
    }

    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.db.get(key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes).with_context(|| format!("decoding {key}"))?)),
            None => Ok(None),
        }
    }

    fn put_bincode<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = bincode::serialize(value)?;
        self.db.insert(key, bytes)?;
        Ok(())
    }

    fn get_bincode<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.db.get(key)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes).with_context(|| format!("decoding {key}"))?)),
            None => Ok(None),
        }
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    pub fn save_index(&self, index: &InvertedIndex) -> Result<()> {
        self.put_bincode(INDEX_KEY, index)
    }

    /// The stored index, or `None` when absent or unreadable.
    pub fn load_index(&self) -> Result<Option<InvertedIndex>> {
        let loaded: Result<Option<InvertedIndex>> = self.get_bincode(INDEX_KEY);
        match loaded {
            Ok(Some(index)) => match index.validate() {
                Ok(()) => Ok(Some(index)),
                Err(e) => {
                    tracing::warn!(error = %e, "stored index failed validation, ignoring it");
                    Ok(None)
                }
            },
            Ok(None) => Ok(None),
            Err(e) => {
                tracing::warn!(error = %e, "stored index is malformed, ignoring it");
                Ok(None)
            }
        }
    }

    pub fn save_documents(&self, docs: &[StoredDoc]) -> Result<()> {
        self.put_bincode(DOCS_KEY, docs)
    }

    pub fn load_documents(&self) -> Result<Vec<StoredDoc>> {
        Ok(self.get_bincode(DOCS_KEY)?.unwrap_or_default())
    }

    pub fn save_meta(&self, meta: &IndexMeta) -> Result<()> {
        self.put_json(META_KEY, meta)
    }

    pub fn load_meta(&self) -> Result<Option<IndexMeta>> {
        self.get_json(META_KEY)
    }

    /// Write index, bodies and metadata together, then flush.
    pub fn save_corpus(&self, corpus: &Corpus) -> Result<IndexMeta> {
        let meta = IndexMeta::now(corpus.index.num_docs());
        self.save_index(&corpus.index)?;
        self.save_documents(&corpus.documents)?;
        self.save_meta(&meta)?;
        self.flush()?;
        Ok(meta)
    }

    /// Load the compiled corpus; `None` when no usable index is stored.
    pub fn load_corpus(&self) -> Result<Option<Corpus>> {
        let Some(index) = self.load_index()? else { return Ok(None) };
        let documents = match self.load_documents() {
            Ok(docs) => docs,
            Err(e) => {
                tracing::warn!(error = %e, "stored documents unreadable, snippets fall back to index text");
                Vec::new()
            }
        };
        Ok(Some(Corpus::new(index, documents)))
    }

    /// Drop compiled index data so the next rebuild starts from scratch.
    pub fn clear_compiled(&self) -> Result<()> {
        for key in [INDEX_KEY, DOCS_KEY, META_KEY] {
            self.db.remove(key)?;
        }
        Ok(())
    }

    pub fn save_faqs(&self, faqs: &[FaqItem]) -> Result<()> {
        self.put_json(FAQ_KEY, faqs)
    }

    /// Stored FAQs, upgraded to the current schema. Upgraded lists are
    /// written back once.
    pub fn load_faqs(&self) -> Result<Vec<FaqItem>> {
        let mut faqs: Vec<FaqItem> = self.get_json(FAQ_KEY)?.unwrap_or_default();
        if migrate_faqs(&mut faqs) > 0 {
            self.save_faqs(&faqs)?;
        }
        Ok(faqs)
    }

    pub fn save_persona(&self, persona: &Persona) -> Result<()> {
        self.put_json(PERSONA_KEY, persona)
    }

    pub fn load_persona(&self) -> Result<Option<Persona>> {
        self.get_json(PERSONA_KEY)
    }

    pub fn save_articles(&self, articles: &[Article]) -> Result<()> {
        self.put_json(ARTICLES_KEY, articles)
    }

    pub fn load_articles(&self) -> Result<Vec<Article>> {
        Ok(self.get_json(ARTICLES_KEY)?.unwrap_or_default())
    }

    /// Free-form dashboard profile; carried through presets untouched.
    pub fn save_profile(&self, profile: &serde_json::Value) -> Result<()> {
        self.put_json(PROFILE_KEY, profile)
    }

    pub fn load_profile(&self) -> Result<serde_json::Value> {
        Ok(self.get_json(PROFILE_KEY)?.unwrap_or_else(|| serde_json::json!({})))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_index_loads_as_none() {
        let store = Store::temporary().unwrap();
        store.db.insert(INDEX_KEY, &b"not bincode"[..]).unwrap();
        assert!(store.load_index().unwrap().is_none());
        assert!(store.load_corpus().unwrap().is_none());
    }

    #[test]
    fn legacy_faqs_are_migrated_on_load() {
        let store = Store::temporary().unwrap();
        let legacy = r#"[{"question":"교환 가능한가요","answer":"7일 이내 가능합니다."}]"#;
        store.db.insert(FAQ_KEY, legacy.as_bytes()).unwrap();
        let faqs = store.load_faqs().unwrap();
        assert_eq!(faqs[0].schema, crate::faq::FAQ_SCHEMA);
        assert!(!faqs[0].tags.is_empty());
    }

    #[test]
    fn clear_compiled_keeps_authored_records() {
        let store = Store::temporary().unwrap();
        store.save_articles(&[crate::testing::article("a1", "T", "B")]).unwrap();
        store.save_corpus(&Corpus::empty(1.5, 0.75)).unwrap();
        store.clear_compiled().unwrap();
        assert!(store.load_meta().unwrap().is_none());
        assert_eq!(store.load_articles().unwrap().len(), 1);
    }
}
