//! One user message in, one bounded reply out.
//!
//! Stages run in order and the first accepted answer wins: fast intent
//! rules, the FAQ shortlist, document-grounded generation, then free
//! generation. A failing stage is logged and skipped.

use crate::capability::{same_language, Capabilities};
use crate::config::PipelineConfig;
use crate::fast_intent::fast_answer;
use crate::faq::{match_from_shortlist, prefilter, FaqItem};
use crate::lang::identify;
use crate::persona::Persona;
use crate::reindex::IndexHandle;
use crate::search::rerank;
use crate::sanitize::{char_len, script_hint, script_matches};
use crate::session::{Session, TurnToken};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

lazy_static! {
    static ref DEBUG_SCORE_PREFIX: Regex = Regex::new(r#"(?i)^\s*\{[^}]*"score"[^}]*\}\s*"#).expect("valid regex");
}

/// Where the widget shows bot messages.
pub trait ReplySink: Send {
    fn append(&mut self, text: &str);
    /// Overwrite the most recent bot message.
    fn replace_last(&mut self, text: &str);
}

/// A sink that just records what the widget would have shown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    pub messages: Vec<String>,
}

impl ReplySink for Transcript {
    fn append(&mut self, text: &str) {
        self.messages.push(text.to_string());
    }

    fn replace_last(&mut self, text: &str) {
        match self.messages.last_mut() {
            Some(last) => *last = text.to_string(),
            None => self.messages.push(text.to_string()),
        }
    }
}

/// Stage that produced a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyStage {
    FastIntent,
    Faq,
    Document,
    Generated,
    NoAnswer,
    Unavailable,
    /// A newer turn started before this one finished; nothing was emitted.
    Superseded,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    /// Body as shown, already clamped.
    pub text: String,
    pub stage: ReplyStage,
    /// Language the reply is addressed in.
    pub lang: String,
    /// Article the answer came from, if any.
    pub doc_id: Option<String>,
}

impl Reply {
    fn new(text: String, stage: ReplyStage, lang: &str) -> Self {
        Self { text, stage, lang: lang.to_string(), doc_id: None }
    }

    fn with_doc_id(mut self, doc_id: Option<String>) -> Self {
        self.doc_id = doc_id;
        self
    }

    /// Body followed by the document reference line.
    pub fn render(&self) -> String {
        match &self.doc_id {
            Some(id) => format!("{}\n\nDOC ID: {id}", self.text),
            None => self.text.clone(),
        }
    }
}

/// Drop a `{..."score"...}` object a matcher reply may have leaked into
/// the front of an answer.
pub fn strip_debug_json(answer: &str) -> String {
    DEBUG_SCORE_PREFIX.replace(answer, "").into_owned()
}

/// Tracks the single bot bubble a turn writes into.
struct Bubble<'a> {
    sink: &'a mut dyn ReplySink,
    open: bool,
}

impl<'a> Bubble<'a> {
    fn new(sink: &'a mut dyn ReplySink) -> Self {
        Self { sink, open: false }
    }

    fn show(&mut self, text: &str) {
        if self.open {
            self.sink.replace_last(text);
        } else {
            self.sink.append(text);
            self.open = true;
        }
    }
}

enum Generation {
    Text(String),
    Unavailable,
    Superseded,
}

/// Routing policy plus everything it reads: capabilities, persona, tunables
/// and the live document index.
pub struct Assistant {
    caps: Capabilities,
    persona: Persona,
    config: PipelineConfig,
    index: Arc<IndexHandle>,
}

impl Assistant {
    pub fn new(caps: Capabilities, persona: Persona, config: PipelineConfig, index: Arc<IndexHandle>) -> Self {
        Self { caps, persona, config, index }
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn index(&self) -> &Arc<IndexHandle> {
        &self.index
    }

    pub fn new_session(&self) -> Session {
        Session::new(&self.config)
    }

    /// Answer `raw` within `turn`. Never fails; the worst case is one of the
    /// fixed messages in [`PipelineConfig::messages`].
    pub async fn respond(
        &self,
        session: &mut Session,
        turn: &TurnToken,
        faqs: &[FaqItem],
        raw: &str,
        sink: &mut dyn ReplySink,
    ) -> Reply {
        let mut bubble = Bubble::new(sink);
        let agent_lang = self.persona.agent_lang.as_str();

        if raw.trim().is_empty() {
            return self.emit(&mut bubble, Reply::new(self.config.messages.no_answer.clone(), ReplyStage::NoAnswer, agent_lang));
        }

        let guess = identify(self.caps.detector.as_ref(), raw, agent_lang, &self.config).await;
        let src = guess.lang.as_str();
        if !turn.is_current() {
            return superseded(src);
        }

        if let Some((intent, item)) = fast_answer(raw, faqs) {
            tracing::info!(?intent, "answered by fast intent");
            let reply = Reply::new(item.answer.clone(), ReplyStage::FastIntent, src).with_doc_id(item.doc_id.clone());
            return self.emit(&mut bubble, reply);
        }

        let normalized = if same_language(src, agent_lang) {
            raw.to_string()
        } else {
            session.translators.translate_or_keep(self.caps.translators.as_ref(), src, agent_lang, raw).await
        };

        if let Some((index, reply)) = self.faq_stage(session, faqs, raw, &normalized, src).await {
            if !turn.is_current() {
                return superseded(src);
            }
            session.cooldown.mark_served(index, Instant::now());
            return self.emit(&mut bubble, reply);
        }
        if !turn.is_current() {
            return superseded(src);
        }

        if let Some(reply) = self.document_stage(session, turn, raw, src, &mut bubble).await {
            if reply.stage == ReplyStage::Superseded {
                return reply;
            }
            return self.emit(&mut bubble, reply);
        }

        let reply = self.free_stage(session, turn, &normalized, src, &mut bubble).await;
        if reply.stage == ReplyStage::Superseded {
            return reply;
        }
        self.emit(&mut bubble, reply)
    }

    fn emit(&self, bubble: &mut Bubble<'_>, reply: Reply) -> Reply {
        tracing::debug!(stage = ?reply.stage, lang = %reply.lang, chars = char_len(&reply.text), "reply emitted");
        bubble.show(&reply.render());
        reply
    }

    fn localize(&self, text: &str, lang: &str) -> String {
        self.persona.localize(text, lang, self.config.max_sentences, self.config.max_chars)
    }

    /// Translate `text` into `src` when its script says it is written in
    /// something else.
    async fn to_source_script(&self, session: &mut Session, text: String, src: &str) -> String {
        if script_matches(&text, src) {
            return text;
        }
        let from = script_hint(&text).unwrap_or(self.persona.agent_lang.as_str()).to_string();
        session.translators.translate_or_keep(self.caps.translators.as_ref(), &from, src, &text).await
    }

    /// Accepted FAQ index and its localized reply. The caller marks it
    /// served once the reply is actually shown.
    async fn faq_stage(
        &self,
        session: &mut Session,
        faqs: &[FaqItem],
        raw: &str,
        normalized: &str,
        src: &str,
    ) -> Option<(usize, Reply)> {
        if faqs.is_empty() {
            return None;
        }
        let english = if same_language(src, "en") {
            None
        } else {
            Some(session.translators.translate_or_keep(self.caps.translators.as_ref(), src, "en", raw).await)
        };
        let hits = prefilter(raw, english.as_deref(), faqs, self.config.prefilter_limit, self.config.prefilter_min_jaccard);
        if hits.is_empty() {
            tracing::debug!("faq prefilter: no candidates");
            return None;
        }
        let shortlist: Vec<usize> = hits.iter().map(|h| h.index).collect();
        let cooled = session.cooldown.filter(&shortlist, Instant::now());
        if cooled.is_empty() {
            tracing::debug!(?shortlist, "faq candidates all cooling down");
            return None;
        }

        let verdict = match_from_shortlist(self.caps.generator.as_ref(), normalized, faqs, &cooled).await?;
        let index = verdict.selected()?;
        if !cooled.contains(&index) {
            tracing::warn!(index, "matcher picked an index outside the shortlist");
            return None;
        }
        let cutoff = self.config.cutoff_for(char_len(raw.trim()));
        if verdict.score < cutoff {
            tracing::debug!(index, score = verdict.score, cutoff, "faq match below cutoff");
            return None;
        }
        let item = faqs.get(index)?;

        let answer = strip_debug_json(&item.answer);
        let answer = self.to_source_script(session, answer, src).await;
        tracing::info!(index, score = verdict.score, "answered from faq");
        Some((index, Reply::new(self.localize(&answer, src), ReplyStage::Faq, src).with_doc_id(item.doc_id.clone())))
    }

    async fn document_stage(
        &self,
        session: &mut Session,
        turn: &TurnToken,
        raw: &str,
        src: &str,
        bubble: &mut Bubble<'_>,
    ) -> Option<Reply> {
        let corpus = self.index.snapshot();
        let hits = corpus.search(raw, Some(src), &self.caps, &mut session.translators, &self.config).await;
        let hit = rerank(self.caps.generator.as_ref(), raw, hits).await?;
        if !turn.is_current() {
            return Some(superseded(src));
        }
        let prompt = format!(
            "{}\nAnswer in the user's language ({src}). Answer briefly (<={} chars). If you cite, prefix with \"참고:\". No markdown.\nUser: {raw}\nContext from article \"{}\": {}\nAgent:",
            self.persona.system_prompt(),
            self.config.prompt_char_hint,
            hit.title,
            hit.snippet,
        );
        match self.generate(&prompt, turn, bubble).await {
            Generation::Superseded => Some(superseded(src)),
            Generation::Unavailable => Some(self.unavailable(src)),
            Generation::Text(draft) if draft.trim().is_empty() => {
                tracing::debug!(article = %hit.article_id, "grounded generation came back empty");
                None
            }
            Generation::Text(draft) => {
                let draft = self.to_source_script(session, draft, src).await;
                tracing::info!(article = %hit.article_id, score = hit.score, "answered from document");
                Some(Reply::new(self.localize(&draft, src), ReplyStage::Document, src).with_doc_id(Some(hit.article_id)))
            }
        }
    }

    async fn free_stage(
        &self,
        session: &mut Session,
        turn: &TurnToken,
        normalized: &str,
        src: &str,
        bubble: &mut Bubble<'_>,
    ) -> Reply {
        let agent_lang = self.persona.agent_lang.as_str();
        let prompt = format!(
            "{}\nRespond in {agent_lang}. No markdown. Max {} sentences, <={} chars.\nUser: {normalized}\nAgent:",
            self.persona.system_prompt(),
            self.config.max_sentences,
            self.config.prompt_char_hint,
        );
        match self.generate(&prompt, turn, bubble).await {
            Generation::Superseded => superseded(src),
            Generation::Unavailable => self.unavailable(src),
            Generation::Text(draft) if draft.trim().is_empty() => {
                Reply::new(self.config.messages.no_answer.clone(), ReplyStage::NoAnswer, src)
            }
            Generation::Text(draft) => {
                let draft = if same_language(src, agent_lang) {
                    draft
                } else {
                    session.translators.translate_or_keep(self.caps.translators.as_ref(), agent_lang, src, &draft).await
                };
                Reply::new(self.localize(&draft, src), ReplyStage::Generated, src)
            }
        }
    }

    fn unavailable(&self, src: &str) -> Reply {
        Reply::new(self.config.messages.unavailable.clone(), ReplyStage::Unavailable, src)
    }

    /// Stream a generation into the bubble: placeholder first, then a
    /// progress note once the draft is long enough. A mid-stream failure
    /// keeps whatever arrived before it.
    async fn generate(&self, prompt: &str, turn: &TurnToken, bubble: &mut Bubble<'_>) -> Generation {
        bubble.show(&self.config.messages.placeholder);
        let mut stream = match self.caps.generator.prompt_stream(prompt).await {
            Ok(stream) => stream,
            Err(e) if e.is_unavailable() => return Generation::Unavailable,
            Err(e) => {
                tracing::warn!(error = %e, "generation failed to start");
                return Generation::Text(String::new());
            }
        };
        let every = self.config.progress_every_chars.max(1);
        let mut draft = String::new();
        let mut reported = 0;
        while let Some(chunk) = stream.next_chunk().await {
            if !turn.is_current() {
                tracing::debug!(turn = turn.id(), "turn superseded mid-stream");
                return Generation::Superseded;
            }
            match chunk {
                Ok(piece) => draft.push_str(&piece),
                Err(e) => {
                    tracing::warn!(error = %e, "generation stream failed, keeping partial draft");
                    break;
                }
            }
            let len = char_len(&draft);
            if len >= every && len - reported >= every {
                bubble.show(&self.config.messages.generating);
                reported = len;
            }
        }
        if !turn.is_current() {
            return Generation::Superseded;
        }
        Generation::Text(draft)
    }
}

fn superseded(lang: &str) -> Reply {
    Reply::new(String::new(), ReplyStage::Superseded, lang)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_json_prefix_is_stripped() {
        assert_eq!(strip_debug_json(r#"{"index": 2, "score": 0.9} 영수증을 지참해 주세요."#), "영수증을 지참해 주세요.");
        assert_eq!(strip_debug_json("{braces} stay"), "{braces} stay");
    }

    #[test]
    fn render_appends_doc_reference() {
        let reply = Reply::new("Ships in 3 days.".to_string(), ReplyStage::Document, "en").with_doc_id(Some("a1".to_string()));
        assert_eq!(reply.render(), "Ships in 3 days.\n\nDOC ID: a1");
    }

    #[test]
    fn transcript_replace_last_overwrites() {
        let mut t = Transcript::default();
        t.append("…");
        t.replace_last("done");
        assert_eq!(t.messages, vec!["done".to_string()]);
    }
}
