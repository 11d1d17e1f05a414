//! Capabilities backed by a model runtime on the same machine.
//!
//! The runtime speaks the `/api/generate` protocol: one JSON request, and
//! either one JSON reply or a newline-delimited stream of
//! `{"response": "...", "done": false}` objects.

use async_trait::async_trait;
use helpdesk_core::capability::{same_language, ScriptDetector};
use helpdesk_core::error::{CapResult, Capability, CapabilityError};
use helpdesk_core::{Capabilities, ChunkStream, Generator, Translator, TranslatorFactory};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct GenerateLine {
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<String>,
}

fn generation_error(e: reqwest::Error) -> CapabilityError {
    if e.is_connect() {
        CapabilityError::Unavailable(Capability::Generation)
    } else {
        CapabilityError::failed(Capability::Generation, e.to_string())
    }
}

/// Splits a byte stream into complete JSON lines.
#[derive(Debug, Default)]
pub struct NdjsonDecoder {
    buf: Vec<u8>,
}

impl NdjsonDecoder {
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Next complete, non-blank line. Blank lines are skipped.
    pub fn next_line(&mut self) -> Option<CapResult<GenerateLine>> {
        loop {
            let pos = self.buf.iter().position(|b| *b == b'\n')?;
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            if line.iter().all(|b| b.is_ascii_whitespace()) {
                continue;
            }
            return Some(
                serde_json::from_slice(&line)
                    .map_err(|e| CapabilityError::failed(Capability::Generation, format!("bad stream line: {e}"))),
            );
        }
    }

    /// Whatever is left once the body ends without a trailing newline.
    pub fn finish(&mut self) -> Option<CapResult<GenerateLine>> {
        self.buf.push(b'\n');
        self.next_line()
    }
}

pub struct LocalModelGenerator {
    client: Client,
    endpoint: String,
    model: String,
}

impl LocalModelGenerator {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        let endpoint = format!("{}/api/generate", base_url.trim_end_matches('/'));
        Ok(Self { client, endpoint, model: model.to_string() })
    }

    async fn send(&self, prompt: &str, stream: bool) -> CapResult<reqwest::Response> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&GenerateRequest { model: &self.model, prompt, stream })
            .send()
            .await
            .map_err(generation_error)?;
        if !resp.status().is_success() {
            return Err(CapabilityError::failed(Capability::Generation, format!("runtime returned {}", resp.status())));
        }
        Ok(resp)
    }
}

struct ResponseStream {
    resp: Option<reqwest::Response>,
    decoder: NdjsonDecoder,
}

impl ResponseStream {
    fn line_to_chunk(&mut self, line: CapResult<GenerateLine>) -> Option<CapResult<String>> {
        match line {
            Ok(GenerateLine { error: Some(message), .. }) => {
                self.resp = None;
                Some(Err(CapabilityError::failed(Capability::Generation, message)))
            }
            Ok(line) => {
                if line.done {
                    self.resp = None;
                }
                Some(Ok(line.response))
            }
            Err(e) => {
                self.resp = None;
                Some(Err(e))
            }
        }
    }
}

#[async_trait]
impl ChunkStream for ResponseStream {
    async fn next_chunk(&mut self) -> Option<CapResult<String>> {
        loop {
            if let Some(line) = self.decoder.next_line() {
                return self.line_to_chunk(line);
            }
            let resp = self.resp.as_mut()?;
            match resp.chunk().await {
                Ok(Some(bytes)) => self.decoder.push(&bytes),
                Ok(None) => {
                    self.resp = None;
                    let rest = self.decoder.finish()?;
                    return self.line_to_chunk(rest);
                }
                Err(e) => {
                    self.resp = None;
                    return Some(Err(generation_error(e)));
                }
            }
        }
    }
}

#[async_trait]
impl Generator for LocalModelGenerator {
    async fn prompt(&self, input: &str) -> CapResult<String> {
        let resp = self.send(input, false).await?;
        let line: GenerateLine = resp.json().await.map_err(generation_error)?;
        match line.error {
            Some(message) => Err(CapabilityError::failed(Capability::Generation, message)),
            None => Ok(line.response),
        }
    }

    async fn prompt_stream(&self, input: &str) -> CapResult<Box<dyn ChunkStream>> {
        let resp = self.send(input, true).await?;
        Ok(Box::new(ResponseStream { resp: Some(resp), decoder: NdjsonDecoder::default() }))
    }
}

const SUPPORTED: &[(&str, &str)] = &[("ko", "Korean"), ("en", "English"), ("ja", "Japanese")];

fn language_name(tag: &str) -> Option<&'static str> {
    SUPPORTED.iter().find(|(t, _)| same_language(t, tag)).map(|(_, name)| *name)
}

/// Translation by prompting the local model.
pub struct PromptTranslator {
    generator: Arc<dyn Generator>,
}

impl PromptTranslator {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self { generator }
    }
}

struct PromptTranslation {
    generator: Arc<dyn Generator>,
    source: &'static str,
    target: &'static str,
}

#[async_trait]
impl Translator for PromptTranslation {
    async fn translate(&self, text: &str) -> CapResult<String> {
        let prompt = format!(
            "Translate the following text from {} to {}. Return only the translation, no notes.\n\n{text}",
            self.source, self.target
        );
        let out = self.generator.prompt(&prompt).await.map_err(|e| match e {
            CapabilityError::Unavailable(_) => CapabilityError::Unavailable(Capability::Translation),
            CapabilityError::Failed { message, .. } => CapabilityError::failed(Capability::Translation, message),
        })?;
        Ok(out.trim().to_string())
    }
}

#[async_trait]
impl TranslatorFactory for PromptTranslator {
    async fn translator(&self, source: &str, target: &str) -> CapResult<Option<Arc<dyn Translator>>> {
        if same_language(source, target) {
            return Ok(None);
        }
        match (language_name(source), language_name(target)) {
            (Some(source), Some(target)) => {
                Ok(Some(Arc::new(PromptTranslation { generator: self.generator.clone(), source, target })))
            }
            _ => Ok(None),
        }
    }
}

/// Script detection plus a local model for translation and generation.
pub fn local_capabilities(base_url: &str, model: &str, timeout: Duration) -> anyhow::Result<Capabilities> {
    let generator: Arc<dyn Generator> = Arc::new(LocalModelGenerator::new(base_url, model, timeout)?);
    Ok(Capabilities::new(Arc::new(ScriptDetector), Arc::new(PromptTranslator::new(generator.clone())), generator))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decoder_waits_for_complete_lines() {
        let mut dec = NdjsonDecoder::default();
        dec.push(br#"{"response":"Hel"#);
        assert!(dec.next_line().is_none());
        dec.push(b"lo\",\"done\":false}\n\n{\"response\":\"!\",\"done\":true}");
        assert_eq!(dec.next_line().unwrap().unwrap().response, "Hello");
        assert!(dec.next_line().is_none());
        let last = dec.finish().unwrap().unwrap();
        assert!(last.done);
        assert!(dec.finish().is_none());
    }

    #[tokio::test]
    async fn translator_only_covers_known_pairs() {
        let factory = PromptTranslator::new(Arc::new(helpdesk_core::capability::Unavailable));
        assert!(factory.translator("ko", "en").await.unwrap().is_some());
        assert!(factory.translator("fr", "en").await.unwrap().is_none());
        assert!(factory.translator("en-US", "en").await.unwrap().is_none());
    }
}
