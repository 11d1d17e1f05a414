//! Scripted capability fakes shared by unit, integration and server tests.
//!
//! Always compiled, hidden from documentation.

#![doc(hidden)]

use crate::capability::{ChunkList, ChunkStream, Detection, Generator, LanguageDetector, Translator, TranslatorFactory};
use crate::error::{CapResult, Capability, CapabilityError};
use crate::index::Article;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Always reports the same language and confidence.
pub struct FixedDetector {
    detection: Detection,
}

impl FixedDetector {
    pub fn new(language: &str, confidence: f32) -> Self {
        Self { detection: Detection { language: language.to_string(), confidence } }
    }
}

#[async_trait]
impl LanguageDetector for FixedDetector {
    async fn detect(&self, _text: &str) -> CapResult<Vec<Detection>> {
        Ok(vec![self.detection.clone()])
    }
}

/// Translator backed by an exact-match phrase table.
///
/// A pair with no entries has no translator; an unknown phrase in a known
/// pair comes back unchanged.
#[derive(Default)]
pub struct MapTranslator {
    table: HashMap<(String, String), HashMap<String, String>>,
    created: AtomicUsize,
}

impl MapTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, source: &str, target: &str, from: &str, to: &str) -> Self {
        self.table
            .entry((source.to_string(), target.to_string()))
            .or_default()
            .insert(from.to_string(), to.to_string());
        self
    }

    /// How many translators the factory handed out.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

struct PhraseTable(HashMap<String, String>);

#[async_trait]
impl Translator for PhraseTable {
    async fn translate(&self, text: &str) -> CapResult<String> {
        Ok(self.0.get(text).cloned().unwrap_or_else(|| text.to_string()))
    }
}

#[async_trait]
impl TranslatorFactory for MapTranslator {
    async fn translator(&self, source: &str, target: &str) -> CapResult<Option<Arc<dyn Translator>>> {
        match self.table.get(&(source.to_string(), target.to_string())) {
            Some(phrases) => {
                self.created.fetch_add(1, Ordering::SeqCst);
                Ok(Some(Arc::new(PhraseTable(phrases.clone()))))
            }
            None => Ok(None),
        }
    }
}

/// Generator that answers by substring rules and records every prompt.
///
/// The first rule whose needle occurs in the prompt wins; streams split the
/// reply into small fragments. A prompt without a rule fails.
#[derive(Default)]
pub struct ScriptedGenerator {
    rules: Vec<(String, String)>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, needle: &str, reply: &str) -> Self {
        self.rules.push((needle.to_string(), reply.to_string()));
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    fn reply_for(&self, input: &str) -> CapResult<String> {
        self.prompts.lock().push(input.to_string());
        self.rules
            .iter()
            .find(|(needle, _)| input.contains(needle.as_str()))
            .map(|(_, reply)| reply.clone())
            .ok_or_else(|| CapabilityError::failed(Capability::Generation, "no scripted reply"))
    }
}

fn fragments(text: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(size.max(1)).map(|c| c.iter().collect()).collect()
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn prompt(&self, input: &str) -> CapResult<String> {
        self.reply_for(input)
    }

    async fn prompt_stream(&self, input: &str) -> CapResult<Box<dyn ChunkStream>> {
        let reply = self.reply_for(input)?;
        Ok(Box::new(ChunkList::new(fragments(&reply, 8))))
    }
}

pub fn article(id: &str, title: &str, body: &str) -> Article {
    Article { id: id.to_string(), title: title.to_string(), body: body.to_string() }
}
