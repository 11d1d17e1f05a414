//! Stored FAQ records and the two-stage lookup over them.
//!
//! [`prefilter`] produces a cheap token-overlap shortlist; [`matcher`] asks
//! the generator to arbitrate within it; [`cooldown`] keeps the matcher
//! from serving the same answer to rapid-fire repeats.

pub mod cooldown;
pub mod enrich;
pub mod matcher;
pub mod prefilter;

use crate::sanitize::char_len;
use crate::tokenizer::tag_tokens;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub use cooldown::CooldownTable;
pub use enrich::{enrich_faq, FaqDraft};
pub use matcher::{match_from_shortlist, parse_match, FaqMatch};
pub use prefilter::{prefilter, PrefilterHit};

/// Current on-disk schema of [`FaqItem`]. Version 0 records predate tags.
pub const FAQ_SCHEMA: u32 = 1;
pub const MAX_TAGS: usize = 64;

/// Cached translations of the question.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedQuestion {
    #[serde(default, alias = "enQ", skip_serializing_if = "Option::is_none")]
    pub en: Option<String>,
    #[serde(default, alias = "koQ", skip_serializing_if = "Option::is_none")]
    pub ko: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaqItem {
    #[serde(default)]
    pub schema: u32,
    pub question: String,
    /// Served verbatim; never rewritten by enrichment.
    pub answer: String,
    #[serde(default)]
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    #[serde(default, alias = "norm")]
    pub normalized_question: NormalizedQuestion,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Article this answer was written from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<String>,
}

fn normalize_tag(tag: &str) -> String {
    tag.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Unique tags from any number of texts: tag tokens of at least two
/// characters, first-seen order, capped at [`MAX_TAGS`].
pub fn derive_tags<'a, I>(texts: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    let mut tags = Vec::new();
    for text in texts {
        for token in tag_tokens(text) {
            if char_len(&token) < 2 || !seen.insert(token.clone()) {
                continue;
            }
            tags.push(token);
            if tags.len() == MAX_TAGS {
                return tags;
            }
        }
    }
    tags
}

impl FaqItem {
    pub fn new(question: &str, answer: &str) -> Self {
        Self {
            schema: FAQ_SCHEMA,
            question: question.to_string(),
            answer: answer.to_string(),
            date: String::new(),
            lang: None,
            normalized_question: NormalizedQuestion::default(),
            tags: Vec::new(),
            doc_id: None,
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags = tags.into_iter().map(|t| normalize_tag(t.as_ref())).collect();
        self
    }

    pub fn with_doc_id(mut self, doc_id: &str) -> Self {
        self.doc_id = Some(doc_id.to_string());
        self
    }

    fn question_texts(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.question.as_str())
            .chain(self.normalized_question.en.as_deref())
            .chain(self.normalized_question.ko.as_deref())
    }

    /// Tags used for prefiltering. Untagged records fall back to tokens of
    /// the question and its cached translations.
    pub fn tag_set(&self) -> HashSet<String> {
        if self.tags.is_empty() {
            self.question_texts().flat_map(tag_tokens).collect()
        } else {
            self.tags.iter().map(|t| normalize_tag(t)).collect()
        }
    }
}

/// Upgrade records written before tags existed. Returns how many changed.
pub fn migrate_faqs(items: &mut [FaqItem]) -> usize {
    let mut upgraded = 0;
    for item in items.iter_mut().filter(|i| i.schema < FAQ_SCHEMA) {
        if item.tags.is_empty() {
            let derived = derive_tags(item.question_texts().collect::<Vec<_>>());
            item.tags = derived;
        } else {
            let mut seen = HashSet::new();
            let tags: Vec<String> = item.tags.iter().map(|t| normalize_tag(t)).filter(|t| seen.insert(t.clone())).collect();
            item.tags = tags.into_iter().take(MAX_TAGS).collect();
        }
        item.schema = FAQ_SCHEMA;
        upgraded += 1;
    }
    if upgraded > 0 {
        tracing::info!(upgraded, "migrated legacy faq records");
    }
    upgraded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_records_deserialize_and_migrate() {
        let json = r#"[{"question":"배송은 얼마나 걸리나요","answer":"2~3일 걸립니다.","date":"2024-01-01","norm":{"enQ":"How long does shipping take"}}]"#;
        let mut items: Vec<FaqItem> = serde_json::from_str(json).unwrap();
        assert_eq!(items[0].schema, 0);
        assert_eq!(migrate_faqs(&mut items), 1);
        let tags = &items[0].tags;
        assert!(tags.contains(&"배송은".to_string()));
        assert!(tags.contains(&"shipping".to_string()));
        assert_eq!(items[0].schema, FAQ_SCHEMA);
        assert_eq!(migrate_faqs(&mut items), 0);
    }

    #[test]
    fn tag_set_prefers_stored_tags() {
        let item = FaqItem::new("환불 어떻게 하나요", "영수증을 지참해 주세요.").with_tags(["Refund", "환불"]);
        let set = item.tag_set();
        assert_eq!(set.len(), 2);
        assert!(set.contains("refund"));
    }

    #[test]
    fn derive_tags_caps_and_dedupes() {
        let text: String = (0..100).map(|i| format!("word{i} ")).collect();
        let tags = derive_tags([text.as_str(), text.as_str()]);
        assert_eq!(tags.len(), MAX_TAGS);
    }
}
