use crate::capability::{same_language, Capabilities, TranslatorCache};
use crate::sanitize::{char_prefix, script_hint};
use crate::tokenizer::tokenize;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type DocId = u32;

pub const INDEX_VERSION: u32 = 2;

/// Added inside the idf logarithm so the argument never reaches zero.
const IDF_EPSILON: f32 = 1e-6;
/// Characters of title + body handed to the detector per article.
const DETECT_SAMPLE_CHARS: usize = 400;

/// Source article as authored in the document manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    pub tf: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermRow {
    pub df: u32,
    pub idf: f32,
    pub postings: Vec<Posting>, // sorted by doc_id
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocRow {
    pub id: String,
    pub title: String,
    /// Number of tokens in the document's merged bag.
    pub length: u32,
    /// English rendering of title and body.
    pub normalized_text: String,
}

/// Raw article text kept next to the index for snippet extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDoc {
    pub id: String,
    pub title: String,
    pub body: String,
}

/// An article after language normalization, ready to be indexed.
#[derive(Debug, Clone)]
pub struct PreparedDoc {
    pub id: String,
    pub title: String,
    pub body: String,
    pub normalized_text: String,
    pub tokens: Vec<String>,
}

/// BM25 inverted index. Position in `docs` is the doc id used by postings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvertedIndex {
    pub version: u32,
    pub k1: f32,
    pub b: f32,
    pub avgdl: f32,
    pub vocab: BTreeMap<String, TermRow>,
    pub docs: Vec<DocRow>,
}

/// `ln((N - df + 0.5) / (df + 0.5) + ε)`. Negative for terms in more than
/// half of the corpus.
pub fn bm25_idf(num_docs: u32, df: u32) -> f32 {
    let n = num_docs as f32;
    let df = df as f32;
    ((n - df + 0.5) / (df + 0.5) + IDF_EPSILON).ln()
}

impl InvertedIndex {
    pub fn empty(k1: f32, b: f32) -> Self {
        Self { version: INDEX_VERSION, k1, b, avgdl: 1.0, vocab: BTreeMap::new(), docs: Vec::new() }
    }

    /// Build postings and statistics from already-tokenized documents.
    pub fn from_prepared(docs: &[PreparedDoc], k1: f32, b: f32) -> Self {
        let mut index = Self::empty(k1, b);
        let mut total_len: u64 = 0;
        for (doc_id, doc) in docs.iter().enumerate() {
            let mut tf_counts: BTreeMap<&str, u32> = BTreeMap::new();
            for term in &doc.tokens {
                *tf_counts.entry(term.as_str()).or_insert(0) += 1;
            }
            for (term, tf) in tf_counts {
                let row = index
                    .vocab
                    .entry(term.to_string())
                    .or_insert_with(|| TermRow { df: 0, idf: 0.0, postings: Vec::new() });
                row.df += 1;
                row.postings.push(Posting { doc_id: doc_id as DocId, tf });
            }
            total_len += doc.tokens.len() as u64;
            index.docs.push(DocRow {
                id: doc.id.clone(),
                title: doc.title.clone(),
                length: doc.tokens.len() as u32,
                normalized_text: doc.normalized_text.clone(),
            });
        }

        let n = index.docs.len() as u32;
        for row in index.vocab.values_mut() {
            row.idf = bm25_idf(n, row.df);
        }
        index.avgdl = if n == 0 { 1.0 } else { (total_len as f32 / n as f32).max(1.0) };
        index
    }

    pub fn num_docs(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn term(&self, term: &str) -> Option<&TermRow> {
        self.vocab.get(term)
    }

    /// Structural checks applied to an index read back from storage.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.version == INDEX_VERSION, "index version {} != {}", self.version, INDEX_VERSION);
        let n = self.docs.len() as u32;
        for (term, row) in &self.vocab {
            anyhow::ensure!(row.df as usize == row.postings.len(), "df mismatch for term {term:?}");
            anyhow::ensure!(row.postings.iter().all(|p| p.doc_id < n), "posting out of range for term {term:?}");
        }
        anyhow::ensure!(self.avgdl >= 1.0 && self.avgdl.is_finite(), "invalid avgdl {}", self.avgdl);
        Ok(())
    }
}

/// Detect the article's language and add an English rendering.
///
/// Translation is best effort: on failure the original text is indexed alone.
pub async fn prepare_article(
    article: &Article,
    caps: &Capabilities,
    translators: &mut TranslatorCache,
) -> PreparedDoc {
    let full = format!("{}\n{}", article.title, article.body);
    let sample = char_prefix(&full, DETECT_SAMPLE_CHARS);
    let source = match caps.detect_top(sample).await {
        Some(d) => d.language,
        None => script_hint(sample).unwrap_or("en").to_string(),
    };

    let english = if same_language(&source, "en") {
        full.clone()
    } else {
        translators.translate_or_keep(caps.translators.as_ref(), &source, "en", &full).await
    };

    let mut tokens = tokenize(&english);
    if english != full {
        tokens.extend(tokenize(&full));
    }
    tracing::debug!(article = %article.id, %source, tokens = tokens.len(), "article prepared");

    PreparedDoc {
        id: article.id.clone(),
        title: article.title.clone(),
        body: article.body.clone(),
        normalized_text: english,
        tokens,
    }
}

/// Full rebuild from `articles`. Returns the index and the stored bodies,
/// aligned by doc id.
pub async fn build_index(
    articles: &[Article],
    caps: &Capabilities,
    translators: &mut TranslatorCache,
    k1: f32,
    b: f32,
) -> (InvertedIndex, Vec<StoredDoc>) {
    let mut prepared = Vec::with_capacity(articles.len());
    for article in articles {
        prepared.push(prepare_article(article, caps, translators).await);
    }
    let index = InvertedIndex::from_prepared(&prepared, k1, b);
    let stored = prepared
        .into_iter()
        .map(|p| StoredDoc { id: p.id, title: p.title, body: p.body })
        .collect();
    tracing::info!(num_docs = index.num_docs(), num_terms = index.vocab.len(), avgdl = index.avgdl, "index built");
    (index, stored)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prepared(id: &str, text: &str) -> PreparedDoc {
        PreparedDoc {
            id: id.to_string(),
            title: id.to_string(),
            body: text.to_string(),
            normalized_text: text.to_string(),
            tokens: tokenize(text),
        }
    }

    #[test]
    fn document_frequency_matches_postings() {
        let docs = vec![prepared("a", "refund policy refund"), prepared("b", "shipping policy")];
        let index = InvertedIndex::from_prepared(&docs, 1.5, 0.75);
        let refund = index.term("refund").unwrap();
        assert_eq!(refund.df, 1);
        assert_eq!(refund.postings, vec![Posting { doc_id: 0, tf: 2 }]);
        let policy = index.term("polici").unwrap();
        assert_eq!(policy.df as usize, policy.postings.len());
        assert_eq!(policy.df, 2);
        assert!((index.avgdl - 2.5).abs() < 1e-6);
        index.validate().unwrap();
    }

    #[test]
    fn idf_goes_negative_for_common_terms() {
        assert!(bm25_idf(1, 1) < 0.0);
        assert!(bm25_idf(10, 1) > 0.0);
    }

    #[test]
    fn empty_corpus_keeps_avgdl_at_one() {
        let index = InvertedIndex::from_prepared(&[], 1.5, 0.75);
        assert_eq!(index.avgdl, 1.0);
        assert!(index.is_empty());
    }
}
