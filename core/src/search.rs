use crate::capability::{same_language, Capabilities, Generator, TranslatorCache};
use crate::config::PipelineConfig;
use crate::index::{DocId, InvertedIndex, StoredDoc};
use crate::sanitize::{char_len, char_prefix, script_hint, split_sentences};
use crate::tokenizer::tokenize;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

lazy_static! {
    static ref FIRST_NUMBER: Regex = Regex::new(r"\d+").expect("valid regex");
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub article_id: String,
    pub title: String,
    pub score: f32,
    pub snippet: String,
}

/// An index together with the bodies it was built from.
#[derive(Debug, Clone, PartialEq)]
pub struct Corpus {
    pub index: InvertedIndex,
    pub documents: Vec<StoredDoc>,
}

/// Unique terms of the original query and its English rendering, in
/// first-seen order.
pub fn query_terms(original: &str, english: Option<&str>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut terms = Vec::new();
    let english_tokens = english.map(tokenize).unwrap_or_default();
    for term in tokenize(original).into_iter().chain(english_tokens) {
        if seen.insert(term.clone()) {
            terms.push(term);
        }
    }
    terms
}

/// Pick the sentence that best introduces `body` for these terms: the first
/// one containing a query term, else the first one, else a plain prefix.
pub fn snippet(body: &str, terms: &[String], max_chars: usize) -> String {
    let wanted: HashSet<&str> = terms.iter().map(String::as_str).collect();
    let sentences = split_sentences(body);
    let chosen = sentences
        .iter()
        .find(|s| tokenize(s).iter().any(|t| wanted.contains(t.as_str())))
        .or_else(|| sentences.first())
        .copied()
        .unwrap_or(body);
    truncate_with_ellipsis(chosen.trim(), max_chars)
}

pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    if char_len(text) <= max_chars {
        return text.to_string();
    }
    let mut out = char_prefix(text, max_chars.saturating_sub(1)).trim_end().to_string();
    out.push('…');
    out
}

pub fn build_rerank_prompt(query: &str, hits: &[SearchHit]) -> String {
    let candidates: Vec<String> =
        hits.iter().enumerate().map(|(i, h)| format!("[{i}] ({}) {}", h.title, h.snippet)).collect();
    format!(
        "Pick one index [n] that best answers the query.\nQuery: {query}\nCandidates:\n{}\nAnswer: only the best index number (0-{})",
        candidates.join("\n"),
        hits.len().saturating_sub(1),
    )
}

/// First number in a re-rank reply, if it names one of `len` candidates.
pub fn parse_pick(raw: &str, len: usize) -> Option<usize> {
    let n: usize = FIRST_NUMBER.find(raw)?.as_str().parse().ok()?;
    (n < len).then_some(n)
}

/// Let the generator choose which hit best answers `query`.
///
/// Best effort: a single hit is returned as is, and a failed call or an
/// unusable reply keeps the BM25 winner.
pub async fn rerank(generator: &dyn Generator, query: &str, mut hits: Vec<SearchHit>) -> Option<SearchHit> {
    if hits.len() <= 1 {
        return hits.into_iter().next();
    }
    let pick = match generator.prompt(&build_rerank_prompt(query, &hits)).await {
        Ok(raw) => parse_pick(&raw, hits.len()),
        Err(e) => {
            tracing::warn!(error = %e, "re-rank call failed, keeping bm25 order");
            None
        }
    };
    tracing::debug!(?pick, candidates = hits.len(), "document re-rank");
    Some(hits.swap_remove(pick.unwrap_or(0)))
}

impl Corpus {
    pub fn new(index: InvertedIndex, documents: Vec<StoredDoc>) -> Self {
        Self { index, documents }
    }

    pub fn empty(k1: f32, b: f32) -> Self {
        Self { index: InvertedIndex::empty(k1, b), documents: Vec::new() }
    }

    /// BM25 scores of every document matching at least one term, best
    /// first; ties keep document order.
    pub fn rank(&self, terms: &[String]) -> Vec<(DocId, f32)> {
        let index = &self.index;
        let (k1, b) = (index.k1, index.b);
        let mut scores: HashMap<DocId, f32> = HashMap::new();
        for term in terms {
            let Some(row) = index.term(term) else { continue };
            for posting in &row.postings {
                let Some(doc) = index.docs.get(posting.doc_id as usize) else { continue };
                let tf = posting.tf as f32;
                let norm = 1.0 - b + b * (doc.length as f32 / index.avgdl);
                let contrib = row.idf * (tf * (k1 + 1.0)) / (tf + k1 * norm);
                *scores.entry(posting.doc_id).or_insert(0.0) += contrib;
            }
        }
        let mut scored: Vec<(DocId, f32)> = scores.into_iter().collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored
    }

    /// Top `top_k` hits with snippets for already-tokenized terms.
    pub fn hits(&self, terms: &[String], top_k: usize, snippet_chars: usize) -> Vec<SearchHit> {
        self.rank(terms)
            .into_iter()
            .take(top_k)
            .filter_map(|(doc_id, score)| {
                let row = self.index.docs.get(doc_id as usize)?;
                let body = self
                    .documents
                    .get(doc_id as usize)
                    .filter(|d| d.id == row.id)
                    .map(|d| d.body.as_str())
                    .unwrap_or(row.normalized_text.as_str());
                Some(SearchHit {
                    article_id: row.id.clone(),
                    title: row.title.clone(),
                    score,
                    snippet: snippet(body, terms, snippet_chars),
                })
            })
            .collect()
    }

    /// Search with best-effort translation of the query to English.
    ///
    /// `source_lang` skips detection when the caller already knows it.
    /// Returns an empty list for an empty index or no matching terms.
    pub async fn search(
        &self,
        query: &str,
        source_lang: Option<&str>,
        caps: &Capabilities,
        translators: &mut TranslatorCache,
        config: &PipelineConfig,
    ) -> Vec<SearchHit> {
        if self.index.is_empty() || query.trim().is_empty() {
            return Vec::new();
        }
        let source = match source_lang {
            Some(lang) => lang.to_string(),
            None => match caps.detect_top(query).await {
                Some(d) => d.language,
                None => script_hint(query).unwrap_or("en").to_string(),
            },
        };
        let english = if same_language(&source, "en") {
            None
        } else {
            Some(translators.translate_or_keep(caps.translators.as_ref(), &source, "en", query).await)
        };
        let terms = query_terms(query, english.as_deref());
        let hits = self.hits(&terms, config.search_top_k, config.snippet_chars);
        tracing::debug!(query, %source, terms = terms.len(), hits = hits.len(), "document search");
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_prefers_sentence_with_query_term() {
        let body = "Welcome to our shop. Refunds take five days. Thanks!";
        let terms = vec!["refund".to_string()];
        assert_eq!(snippet(body, &terms, 240), "Refunds take five days.");
        assert_eq!(snippet(body, &["zebra".to_string()], 240), "Welcome to our shop.");
    }

    #[test]
    fn snippet_truncates_long_sentences() {
        let body = "a".repeat(500);
        let s = snippet(&body, &[], 240);
        assert_eq!(char_len(&s), 240);
        assert!(s.ends_with('…'));
    }

    #[test]
    fn pick_is_first_number_in_range() {
        assert_eq!(parse_pick("The best is [2].", 5), Some(2));
        assert_eq!(parse_pick("1", 2), Some(1));
        assert_eq!(parse_pick("7", 5), None);
        assert_eq!(parse_pick("none of them", 5), None);
    }

    #[test]
    fn query_terms_are_unique() {
        let terms = query_terms("refund refund", Some("refund shipping"));
        assert_eq!(terms, vec!["refund".to_string(), "ship".to_string()]);
    }
}
