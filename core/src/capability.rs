//! Interfaces to the on-device language primitives.
//!
//! Detection, translation and generation are supplied by whatever runtime
//! hosts the widget. The pipeline only ever talks to these traits, so a
//! missing or flaky primitive degrades a stage instead of failing a turn.

use crate::error::{CapResult, Capability, CapabilityError};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// One candidate language reported by a detector.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub language: String,
    pub confidence: f32,
}

#[async_trait]
pub trait LanguageDetector: Send + Sync {
    /// Candidates ordered by confidence, best first. May be empty.
    async fn detect(&self, text: &str) -> CapResult<Vec<Detection>>;
}

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str) -> CapResult<String>;
}

#[async_trait]
pub trait TranslatorFactory: Send + Sync {
    /// `Ok(None)` when the pair is unsupported or source and target match.
    async fn translator(&self, source: &str, target: &str) -> CapResult<Option<Arc<dyn Translator>>>;
}

/// Finite, forward-only sequence of generated text fragments.
///
/// `None` signals completion; `Some(Err(_))` signals a failure, after which
/// the stream should not be polled again.
#[async_trait]
pub trait ChunkStream: Send {
    async fn next_chunk(&mut self) -> Option<CapResult<String>>;
}

#[async_trait]
pub trait Generator: Send + Sync {
    async fn prompt(&self, input: &str) -> CapResult<String>;
    async fn prompt_stream(&self, input: &str) -> CapResult<Box<dyn ChunkStream>>;
}

/// The three primitives a pipeline needs, shared behind `Arc`s.
#[derive(Clone)]
pub struct Capabilities {
    pub detector: Arc<dyn LanguageDetector>,
    pub translators: Arc<dyn TranslatorFactory>,
    pub generator: Arc<dyn Generator>,
}

impl Capabilities {
    pub fn new(
        detector: Arc<dyn LanguageDetector>,
        translators: Arc<dyn TranslatorFactory>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        Self { detector, translators, generator }
    }

    /// Script heuristics only: no translation, no generation.
    pub fn offline() -> Self {
        Self {
            detector: Arc::new(ScriptDetector),
            translators: Arc::new(NoTranslation),
            generator: Arc::new(Unavailable),
        }
    }

    /// Detect the top language of `text`, `None` on empty results or failure.
    pub async fn detect_top(&self, text: &str) -> Option<Detection> {
        match self.detector.detect(text).await {
            Ok(list) => list.into_iter().next(),
            Err(e) => {
                tracing::warn!(error = %e, "language detection failed");
                None
            }
        }
    }
}

/// Primary subtag of a BCP 47 tag, lowercased (`en-US` -> `en`).
pub fn primary_subtag(tag: &str) -> String {
    tag.split(['-', '_']).next().unwrap_or(tag).to_ascii_lowercase()
}

pub fn same_language(a: &str, b: &str) -> bool {
    primary_subtag(a) == primary_subtag(b)
}

/// Translators created during one conversation, keyed by `(source, target)`.
///
/// Factory failures are not cached, so a transient failure is retried on
/// the next turn; an unsupported pair (`None`) is.
#[derive(Default)]
pub struct TranslatorCache {
    entries: HashMap<(String, String), Option<Arc<dyn Translator>>>,
}

impl TranslatorCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(
        &mut self,
        factory: &dyn TranslatorFactory,
        source: &str,
        target: &str,
    ) -> CapResult<Option<Arc<dyn Translator>>> {
        if same_language(source, target) {
            return Ok(None);
        }
        let key = (primary_subtag(source), primary_subtag(target));
        if let Some(entry) = self.entries.get(&key) {
            return Ok(entry.clone());
        }
        let translator = factory.translator(&key.0, &key.1).await?;
        self.entries.insert(key, translator.clone());
        Ok(translator)
    }

    /// Best-effort translation: the input comes back unchanged when no
    /// translator exists or the call fails.
    pub async fn translate_or_keep(
        &mut self,
        factory: &dyn TranslatorFactory,
        source: &str,
        target: &str,
        text: &str,
    ) -> String {
        match self.get(factory, source, target).await {
            Ok(Some(translator)) => match translator.translate(text).await {
                Ok(out) => out,
                Err(e) => {
                    tracing::warn!(error = %e, source, target, "translation failed, keeping original text");
                    text.to_string()
                }
            },
            Ok(None) => text.to_string(),
            Err(e) => {
                tracing::warn!(error = %e, source, target, "translator unavailable, keeping original text");
                text.to_string()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Drain a stream into one string. Stops at the first error.
pub async fn collect_stream(mut stream: Box<dyn ChunkStream>) -> CapResult<String> {
    let mut out = String::new();
    while let Some(chunk) = stream.next_chunk().await {
        out.push_str(&chunk?);
    }
    Ok(out)
}

/// A stream over fragments that are already in memory.
pub struct ChunkList {
    chunks: VecDeque<CapResult<String>>,
}

impl ChunkList {
    pub fn new<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { chunks: chunks.into_iter().map(|c| Ok(c.into())).collect() }
    }

    /// Yields `chunks`, then fails with `error`.
    pub fn failing<I, S>(chunks: I, error: CapabilityError) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list = Self::new(chunks);
        list.chunks.push_back(Err(error));
        list
    }
}

#[async_trait]
impl ChunkStream for ChunkList {
    async fn next_chunk(&mut self) -> Option<CapResult<String>> {
        self.chunks.pop_front()
    }
}

/// Detector that relies on Unicode script counts alone.
///
/// Confidence is the dominant script's share of all letters, so mixed input
/// comes back under-confident and the identifier's script rules take over.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScriptDetector;

#[async_trait]
impl LanguageDetector for ScriptDetector {
    async fn detect(&self, text: &str) -> CapResult<Vec<Detection>> {
        let (mut hangul, mut kana, mut han, mut latin) = (0usize, 0usize, 0usize, 0usize);
        for c in text.chars() {
            match c {
                '\u{AC00}'..='\u{D7A3}' | '\u{1100}'..='\u{11FF}' | '\u{3130}'..='\u{318F}' => hangul += 1,
                '\u{3040}'..='\u{30FF}' => kana += 1,
                '\u{4E00}'..='\u{9FFF}' => han += 1,
                c if c.is_ascii_alphabetic() => latin += 1,
                c if c.is_alphabetic() && (c as u32) < 0x0250 => latin += 1,
                _ => {}
            }
        }
        let total = hangul + kana + han + latin;
        if total == 0 {
            return Ok(Vec::new());
        }
        // Han without kana is still reported as Japanese; Chinese is not a
        // supported reply language.
        let mut out: Vec<Detection> = [("ko", hangul), ("ja", kana + han), ("en", latin)]
            .into_iter()
            .filter(|(_, n)| *n > 0)
            .map(|(lang, n)| Detection { language: lang.to_string(), confidence: n as f32 / total as f32 })
            .collect();
        out.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal));
        Ok(out)
    }
}

/// Factory for runtimes without any translation model.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTranslation;

#[async_trait]
impl TranslatorFactory for NoTranslation {
    async fn translator(&self, _source: &str, _target: &str) -> CapResult<Option<Arc<dyn Translator>>> {
        Ok(None)
    }
}

/// Stand-in for a primitive the runtime does not provide.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unavailable;

#[async_trait]
impl Generator for Unavailable {
    async fn prompt(&self, _input: &str) -> CapResult<String> {
        Err(CapabilityError::Unavailable(Capability::Generation))
    }

    async fn prompt_stream(&self, _input: &str) -> CapResult<Box<dyn ChunkStream>> {
        Err(CapabilityError::Unavailable(Capability::Generation))
    }
}

#[async_trait]
impl LanguageDetector for Unavailable {
    async fn detect(&self, _text: &str) -> CapResult<Vec<Detection>> {
        Err(CapabilityError::Unavailable(Capability::Detection))
    }
}

#[async_trait]
impl TranslatorFactory for Unavailable {
    async fn translator(&self, _source: &str, _target: &str) -> CapResult<Option<Arc<dyn Translator>>> {
        Err(CapabilityError::Unavailable(Capability::Translation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn script_detector_prefers_dominant_script() {
        let list = ScriptDetector.detect("배송 언제 와요 ok").await.unwrap();
        assert_eq!(list[0].language, "ko");
        assert!(list[0].confidence > 0.5);
        assert_eq!(list[1].language, "en");
    }

    #[tokio::test]
    async fn script_detector_is_empty_without_letters() {
        assert!(ScriptDetector.detect("123 !!").await.unwrap().is_empty());
    }

    #[test]
    fn primary_subtag_strips_region() {
        assert_eq!(primary_subtag("en-US"), "en");
        assert!(same_language("ko", "ko_KR"));
        assert!(!same_language("ko", "ja"));
    }

    #[tokio::test]
    async fn collect_stream_stops_on_error() {
        let stream = ChunkList::failing(["a", "b"], CapabilityError::failed(Capability::Generation, "boom"));
        assert!(collect_stream(Box::new(stream)).await.is_err());
        let ok = collect_stream(Box::new(ChunkList::new(["a", "b"]))).await.unwrap();
        assert_eq!(ok, "ab");
    }
}
