//! Agent persona: tone, honorifics and reply-shaping rules.
//!
//! Everything except [`Persona::system_prompt`] is a pure text transform so
//! each rule can be tested on its own.

use crate::capability::same_language;
use crate::sanitize::{char_prefix, split_sentences};
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_HONORIFIC_KO: &str = "고객님";
const HONORIFIC_WINDOW_CHARS: usize = 20;
const FORBIDDEN_REPLACEMENT_KO: &str = "자세히 확인해 도와드리겠습니다";
const FORBIDDEN_REPLACEMENT_EN: &str = "let me check the details for you";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tone {
    FriendlyFormal,
    #[default]
    Neutral,
    Casual,
}

impl Tone {
    fn as_str(&self) -> &'static str {
        match self {
            Tone::FriendlyFormal => "friendly-formal",
            Tone::Neutral => "neutral",
            Tone::Casual => "casual",
        }
    }

    fn guidance(&self) -> &'static str {
        match self {
            Tone::FriendlyFormal => {
                "You speak warmly and respectfully like a customer service professional. \
                 Always be polite and appreciative. Thank the user for their patience. \
                 Avoid slang or robotic phrasing. Keep sentences clear and empathetic."
            }
            Tone::Neutral => {
                "You speak clearly and professionally. Be concise and factual, \
                 but remain courteous and solution-oriented."
            }
            Tone::Casual => {
                "You sound approachable and human, yet still polite. \
                 Keep it friendly without being overly informal."
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReplyStyle {
    pub no_markdown: bool,
    pub max_sentences: usize,
    pub max_chars: usize,
    pub use_honorific: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ending_particle: Option<String>,
}

impl Default for ReplyStyle {
    fn default() -> Self {
        Self { no_markdown: true, max_sentences: 4, max_chars: 360, use_honorific: false, ending_particle: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Persona {
    pub company_id: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    #[serde(default = "default_agent_lang")]
    pub agent_lang: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub tone: Tone,
    #[serde(default)]
    pub forbidden_phrases: Vec<String>,
    /// Form of address per language tag.
    #[serde(default)]
    pub honorifics: BTreeMap<String, String>,
    /// Greeting per language tag, shown when a conversation opens.
    #[serde(default)]
    pub opening: BTreeMap<String, String>,
    #[serde(default)]
    pub reply_style: ReplyStyle,
}

fn default_agent_lang() -> String {
    "en".to_string()
}

impl Default for Persona {
    fn default() -> Self {
        Self {
            company_id: "default".to_string(),
            display_name: "Support".to_string(),
            agent_name: None,
            agent_lang: default_agent_lang(),
            role: "Customer support agent".to_string(),
            tone: Tone::default(),
            forbidden_phrases: Vec::new(),
            honorifics: BTreeMap::new(),
            opening: BTreeMap::new(),
            reply_style: ReplyStyle::default(),
        }
    }
}

/// Prepend `"{honorific}, "` unless an address term already opens the text.
pub fn apply_honorific(text: &str, honorific: &str) -> String {
    let head = char_prefix(text, HONORIFIC_WINDOW_CHARS);
    if head.contains(honorific) || head.contains(DEFAULT_HONORIFIC_KO) || head.contains('♥') {
        text.to_string()
    } else {
        format!("{honorific}, {text}")
    }
}

/// Replace trailing terminal punctuation with `particle`.
pub fn apply_ending_particle(text: &str, particle: &str) -> String {
    let trimmed = text.trim_end().trim_end_matches(['.', '!', '?', '。', '？', '！']);
    if particle.is_empty() || trimmed.ends_with(particle) {
        trimmed.to_string()
    } else {
        format!("{trimmed}{particle}")
    }
}

/// Keep the first `max_sentences` sentences, then cut to `max_chars`
/// characters with a trailing ellipsis.
pub fn clamp_reply(text: &str, max_sentences: usize, max_chars: usize) -> String {
    let joined = split_sentences(text).into_iter().take(max_sentences).collect::<Vec<_>>().join(" ");
    if joined.chars().count() <= max_chars {
        return joined;
    }
    let mut out = char_prefix(&joined, max_chars.saturating_sub(1)).to_string();
    out.push('…');
    out
}

/// Case-insensitive replacement of each phrase by a polite deferral in
/// `lang`.
pub fn replace_forbidden(text: &str, phrases: &[String], lang: &str) -> String {
    let replacement = if same_language(lang, "ko") { FORBIDDEN_REPLACEMENT_KO } else { FORBIDDEN_REPLACEMENT_EN };
    let mut out = text.to_string();
    for phrase in phrases.iter().filter(|p| !p.trim().is_empty()) {
        match RegexBuilder::new(&regex::escape(phrase)).case_insensitive(true).build() {
            Ok(re) => out = re.replace_all(&out, replacement).into_owned(),
            Err(e) => tracing::warn!(error = %e, phrase, "skipping forbidden phrase"),
        }
    }
    out
}

impl Persona {
    pub fn honorific(&self, lang: &str) -> &str {
        self.honorifics
            .iter()
            .find(|(k, _)| same_language(k, lang))
            .map(|(_, v)| v.as_str())
            .unwrap_or(if same_language(lang, "ko") { DEFAULT_HONORIFIC_KO } else { "Customer" })
    }

    pub fn opening_for(&self, lang: &str) -> Option<&str> {
        self.opening.iter().find(|(k, _)| same_language(k, lang)).map(|(_, v)| v.as_str())
    }

    /// Sentence and character caps, never looser than the hard limits.
    pub fn limits(&self, hard_sentences: usize, hard_chars: usize) -> (usize, usize) {
        let sentences = if self.reply_style.max_sentences == 0 { hard_sentences } else { self.reply_style.max_sentences.min(hard_sentences) };
        let chars = if self.reply_style.max_chars == 0 { hard_chars } else { self.reply_style.max_chars.min(hard_chars) };
        (sentences, chars)
    }

    /// Apply persona touches for a reply in `lang`, then clamp. Honorific and
    /// ending particle are Korean-only.
    pub fn localize(&self, text: &str, lang: &str, hard_sentences: usize, hard_chars: usize) -> String {
        let mut out = replace_forbidden(text.trim(), &self.forbidden_phrases, lang);
        if same_language(lang, "ko") {
            if self.reply_style.use_honorific {
                out = apply_honorific(&out, self.honorific("ko"));
            }
            if let Some(particle) = self.reply_style.ending_particle.as_deref() {
                out = apply_ending_particle(&out, particle);
            }
        }
        let (sentences, chars) = self.limits(hard_sentences, hard_chars);
        clamp_reply(&out, sentences, chars)
    }

    /// Style prefix sent in-band ahead of every generation prompt.
    pub fn system_prompt(&self) -> String {
        let name = self.agent_name.as_deref().unwrap_or(&self.display_name);
        let cx_role = ["CX", "고객", "상담", "지원", "문의", "교환", "환불", "배송"]
            .iter()
            .any(|k| self.role.to_lowercase().contains(&k.to_lowercase()));
        let forbidden = if self.forbidden_phrases.is_empty() { "(none)".to_string() } else { self.forbidden_phrases.join(", ") };
        let style = &self.reply_style;
        let mut parts = vec![
            format!("You are \"{name}\" for {}.", self.display_name),
            format!("Role: {}", self.role),
            format!("Style: {}.", self.tone.as_str()),
            self.tone.guidance().to_string(),
        ];
        if cx_role {
            parts.push("Maintain a service-oriented tone. De-escalate frustration and offer clear next steps.".to_string());
        }
        parts.push("Address the user appropriately by language:".to_string());
        parts.push(format!("- ko: \"{}\"", self.honorific("ko")));
        parts.push(format!("- en: \"{}\"", self.honorific("en")));
        parts.push("- ja: \"お客様\"".to_string());
        parts.push(format!(
            "Constraints: plain text only{}, up to {} sentences and {} characters.",
            if style.no_markdown { " (no markdown)" } else { "" },
            style.max_sentences,
            style.max_chars
        ));
        parts.push(format!("Never mention model identity or internal policies; avoid: {forbidden}."));
        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn honorific_is_prepended_once() {
        assert_eq!(apply_honorific("배송은 3일 걸립니다.", "고객님"), "고객님, 배송은 3일 걸립니다.");
        assert_eq!(apply_honorific("고객님 배송은 3일 걸립니다.", "회원님"), "고객님 배송은 3일 걸립니다.");
    }

    #[test]
    fn ending_particle_replaces_punctuation() {
        assert_eq!(apply_ending_particle("감사합니다!!", "용"), "감사합니다용");
        assert_eq!(apply_ending_particle("감사합니다용.", "용"), "감사합니다용");
    }

    #[test]
    fn clamp_limits_sentences_then_chars() {
        let text = "One. Two. Three. Four. Five.";
        assert_eq!(clamp_reply(text, 4, 360), "One. Two. Three. Four.");
        let long = "x".repeat(400);
        let out = clamp_reply(&long, 4, 360);
        assert_eq!(out.chars().count(), 360);
        assert!(out.ends_with('…'));
    }

    #[test]
    fn forbidden_phrases_are_case_insensitive() {
        let out = replace_forbidden("As an AI model I cannot.", &["as an ai model".to_string()], "en");
        assert_eq!(out, "let me check the details for you I cannot.");
    }

    #[test]
    fn localize_skips_korean_touches_for_english() {
        let mut persona = Persona::default();
        persona.reply_style.use_honorific = true;
        persona.reply_style.ending_particle = Some("요".to_string());
        assert_eq!(persona.localize("Your order ships today.", "en", 4, 360), "Your order ships today.");
        assert_eq!(persona.localize("오늘 출고됩니다.", "ko", 4, 360), "고객님, 오늘 출고됩니다요");
    }

    #[test]
    fn persona_json_uses_widget_field_names() {
        let json = r#"{"companyId":"acme","displayName":"Acme","agentLang":"en","role":"CX 상담","tone":"friendly-formal",
            "honorifics":{"ko":"회원님"},"replyStyle":{"useHonorific":true,"endingParticle":"요"}}"#;
        let p: Persona = serde_json::from_str(json).unwrap();
        assert_eq!(p.tone, Tone::FriendlyFormal);
        assert_eq!(p.honorific("ko"), "회원님");
        assert_eq!(p.reply_style.max_chars, 360);
        assert!(p.system_prompt().contains("service-oriented"));
    }
}
