use super::{derive_tags, FaqItem, NormalizedQuestion, FAQ_SCHEMA, MAX_TAGS};
use crate::capability::{same_language, Capabilities, TranslatorCache};
use crate::sanitize::char_prefix;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use time::format_description::well_known::Rfc3339;

lazy_static! {
    static ref NOT_KEYWORD: Regex = Regex::new(r"[^a-z0-9, ]").expect("valid regex");
    static ref KEYWORD_SPLIT: Regex = Regex::new(r"[,\s]+").expect("valid regex");
}

const DETECT_SAMPLE_CHARS: usize = 200;
const MAX_INTENT_KEYWORDS: usize = 12;

/// A question/answer pair as typed by the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaqDraft {
    pub question: String,
    pub answer: String,
    pub doc_id: Option<String>,
}

fn parse_keywords(raw: &str) -> Vec<String> {
    let lowered = raw.to_lowercase();
    let cleaned = NOT_KEYWORD.replace_all(&lowered, "");
    KEYWORD_SPLIT
        .split(&cleaned)
        .filter(|w| !w.is_empty())
        .take(MAX_INTENT_KEYWORDS)
        .map(str::to_string)
        .collect()
}

async fn intent_keywords(caps: &Capabilities, english: &str) -> Vec<String> {
    let prompt = format!(
        "List 5-8 short intent keywords (lowercase, no punctuation) for the user question:\nQ: {english}\nReturn as comma-separated words only."
    );
    match caps.generator.prompt(&prompt).await {
        Ok(raw) => parse_keywords(&raw),
        Err(e) => {
            tracing::warn!(error = %e, "intent keyword extraction skipped");
            Vec::new()
        }
    }
}

/// Build a stored FAQ from an operator draft: detect the question language,
/// cache English and Korean renderings, and derive tags. The answer is kept
/// exactly as written.
pub async fn enrich_faq(draft: FaqDraft, caps: &Capabilities, translators: &mut TranslatorCache) -> FaqItem {
    let lang = caps
        .detect_top(char_prefix(&draft.question, DETECT_SAMPLE_CHARS))
        .await
        .map(|d| d.language)
        .unwrap_or_else(|| "en".to_string());

    let en = if same_language(&lang, "en") {
        draft.question.clone()
    } else {
        translators.translate_or_keep(caps.translators.as_ref(), &lang, "en", &draft.question).await
    };
    let ko = if same_language(&lang, "ko") {
        draft.question.clone()
    } else {
        translators.translate_or_keep(caps.translators.as_ref(), &lang, "ko", &draft.question).await
    };

    let mut tags = derive_tags([draft.question.as_str(), en.as_str(), ko.as_str()]);
    let mut seen: HashSet<String> = tags.iter().cloned().collect();
    for keyword in intent_keywords(caps, &en).await {
        if tags.len() >= MAX_TAGS {
            break;
        }
        if keyword.chars().count() >= 2 && seen.insert(keyword.clone()) {
            tags.push(keyword);
        }
    }

    let date = time::OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default();
    tracing::info!(%lang, tags = tags.len(), "faq enriched");
    FaqItem {
        schema: FAQ_SCHEMA,
        question: draft.question,
        answer: draft.answer,
        date,
        lang: Some(lang),
        normalized_question: NormalizedQuestion { en: Some(en), ko: Some(ko) },
        tags,
        doc_id: draft.doc_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_are_cleaned_and_capped() {
        let kws = parse_keywords("Refund, Return-Policy;  money back\nreceipt");
        assert_eq!(kws, vec!["refund", "returnpolicy", "money", "back", "receipt"]);
    }
}
