use super::FaqItem;
use crate::capability::Generator;

/// The generator's verdict. `index == -1` means nothing in the shortlist fits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaqMatch {
    pub index: i64,
    pub score: f32,
}

impl FaqMatch {
    pub const NONE: FaqMatch = FaqMatch { index: -1, score: 0.0 };

    pub fn selected(&self) -> Option<usize> {
        usize::try_from(self.index).ok()
    }
}

/// One prompt listing the shortlisted pairs by their FAQ index.
///
/// The 0.75 figure in the prompt is a hint to the model only; the caller
/// applies its own cutoff.
pub fn build_match_prompt(query: &str, faqs: &[FaqItem], candidates: &[usize]) -> String {
    let list = candidates
        .iter()
        .filter_map(|&i| faqs.get(i).map(|f| format!("#{i}\nQ: {}\nA: {}", f.question, f.answer)))
        .collect::<Vec<_>>()
        .join("\n\n");
    let user_line = format!("USER: {query}");
    [
        "You are an intent matcher. Compare USER question with the shortlist of FAQs.",
        "Choose the single best by semantic intent, tolerant to paraphrase.",
        "Return ONLY JSON: {\"index\": <number>, \"score\": <0..1>}",
        "If none is suitable (score < 0.75), return {\"index\": -1, \"score\": 0.0}.",
        "",
        "FAQ SHORTLIST:",
        list.as_str(),
        "",
        user_line.as_str(),
        "RESULT JSON:",
    ]
    .join("\n")
}

fn number_as_i64(v: &serde_json::Value) -> Option<i64> {
    v.as_i64().or_else(|| v.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
}

/// Read the trailing `{index, score}` object of a model reply, ignoring
/// any leading chatter or code fences. `None` when nothing parses.
pub fn parse_match(raw: &str) -> Option<FaqMatch> {
    let text = raw.trim();
    let end = text.rfind('}')?;
    for (start, _) in text[..end].match_indices('{') {
        let Ok(value) = serde_json::from_str::<serde_json::Value>(&text[start..=end]) else { continue };
        let index = number_as_i64(value.get("index")?)?;
        let score = value.get("score")?.as_f64()? as f32;
        if index < 0 {
            return Some(FaqMatch::NONE);
        }
        return Some(FaqMatch { index, score });
    }
    None
}

/// Ask the generator to pick at most one candidate. Generator failures and
/// unparseable replies both come back as `None`.
pub async fn match_from_shortlist(
    generator: &dyn Generator,
    query: &str,
    faqs: &[FaqItem],
    candidates: &[usize],
) -> Option<FaqMatch> {
    if faqs.is_empty() || candidates.is_empty() {
        return None;
    }
    let prompt = build_match_prompt(query, faqs, candidates);
    let raw = match generator.prompt(&prompt).await {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(error = %e, "intent matcher call failed");
            return None;
        }
    };
    let parsed = parse_match(&raw);
    if parsed.is_none() {
        tracing::warn!(reply_len = raw.len(), "intent matcher reply did not parse");
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_trailing_object_after_chatter() {
        let m = parse_match("Sure! Here you go {note} {\"index\": 2, \"score\": 0.91}").unwrap();
        assert_eq!(m.index, 2);
        assert!((m.score - 0.91).abs() < 1e-6);
    }

    #[test]
    fn parses_fenced_reply() {
        let m = parse_match("```json\n{\"index\": 0, \"score\": 0.8}\n```").unwrap();
        assert_eq!(m.selected(), Some(0));
    }

    #[test]
    fn negative_index_means_none() {
        assert_eq!(parse_match("{\"index\": -1, \"score\": 0.3}"), Some(FaqMatch::NONE));
        assert_eq!(FaqMatch::NONE.selected(), None);
    }

    #[test]
    fn garbage_is_no_match() {
        assert_eq!(parse_match("I think the second one"), None);
        assert_eq!(parse_match("{\"index\": \"two\"}"), None);
    }

    #[test]
    fn prompt_lists_candidates_by_index() {
        let faqs = vec![FaqItem::new("q0", "a0"), FaqItem::new("q1", "a1")];
        let p = build_match_prompt("hello", &faqs, &[1]);
        assert!(p.contains("#1\nQ: q1\nA: a1"));
        assert!(!p.contains("q0"));
        assert!(p.ends_with("USER: hello\nRESULT JSON:"));
    }
}
