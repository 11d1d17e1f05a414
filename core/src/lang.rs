//! Language identification for noisy chat input.
//!
//! Generic detectors are systematically under-confident on short Korean
//! utterances, so Hangul density overrides them, and script hints back them
//! up whenever their confidence is low.

use crate::capability::{same_language, Detection, LanguageDetector};
use crate::config::PipelineConfig;
use crate::sanitize::{char_len, hangul_ratio, has_hangul, script_hint, strip_for_detection};

/// Which rule decided the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LangSource {
    /// Enough Hangul in the raw text.
    Hangul,
    /// The detector cleared its confidence threshold.
    Detector,
    /// Script of the raw text.
    Script,
    /// The agent's configured language.
    Agent,
    /// Too short to detect at all.
    ShortInput,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LanguageGuess {
    pub lang: String,
    pub confidence: f32,
    pub source: LangSource,
}

/// Below this many characters the deployment default is used.
const MIN_DETECT_CHARS: usize = 2;
/// Inputs this short count as Korean as soon as they contain any Hangul.
const SHORT_HANGUL_CHARS: usize = 3;
const DEFAULT_SHORT_LANG: &str = "ko";

fn confidence_for(list: &[Detection], lang: &str) -> f32 {
    list.iter()
        .find(|d| same_language(&d.language, lang))
        .map(|d| d.confidence)
        .unwrap_or(0.0)
}

/// Identify the language of `raw`. Never fails: detector errors fall
/// through to the script and agent-language rules.
pub async fn identify(
    detector: &dyn LanguageDetector,
    raw: &str,
    agent_lang: &str,
    config: &PipelineConfig,
) -> LanguageGuess {
    let trimmed_len = char_len(raw.trim());
    if trimmed_len < MIN_DETECT_CHARS {
        return LanguageGuess { lang: DEFAULT_SHORT_LANG.to_string(), confidence: 0.0, source: LangSource::ShortInput };
    }

    let clean = strip_for_detection(raw);
    let detections = if char_len(&clean) >= MIN_DETECT_CHARS {
        match detector.detect(&clean).await {
            Ok(list) => list,
            Err(e) => {
                tracing::warn!(error = %e, "detector failed, using script fallback");
                Vec::new()
            }
        }
    } else {
        Vec::new()
    };
    let top = detections.first();
    let conf = top.map(|d| d.confidence).unwrap_or(0.0);

    let ratio = hangul_ratio(raw);
    let ko_strong = has_hangul(raw) && (ratio >= config.hangul_ratio || trimmed_len <= SHORT_HANGUL_CHARS);
    let guess = if ko_strong {
        LanguageGuess {
            lang: "ko".to_string(),
            confidence: ratio.max(confidence_for(&detections, "ko")),
            source: LangSource::Hangul,
        }
    } else if let Some(hint) = script_hint(raw) {
        match top {
            Some(d) if conf >= config.hinted_confidence => {
                LanguageGuess { lang: d.language.clone(), confidence: conf, source: LangSource::Detector }
            }
            _ => LanguageGuess {
                lang: hint.to_string(),
                confidence: confidence_for(&detections, hint),
                source: LangSource::Script,
            },
        }
    } else {
        match top {
            Some(d) if conf >= config.unhinted_confidence => {
                LanguageGuess { lang: d.language.clone(), confidence: conf, source: LangSource::Detector }
            }
            _ => LanguageGuess { lang: agent_lang.to_string(), confidence: conf, source: LangSource::Agent },
        }
    };
    tracing::debug!(lang = %guess.lang, confidence = guess.confidence, source = ?guess.source, "language identified");
    guess
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FixedDetector;

    #[tokio::test]
    async fn hangul_overrides_detector() {
        let det = FixedDetector::new("ja", 0.99);
        let g = identify(&det, "배송 언제 와요?", "en", &PipelineConfig::default()).await;
        assert_eq!(g.lang, "ko");
        assert_eq!(g.source, LangSource::Hangul);
    }

    #[tokio::test]
    async fn jamo_only_falls_back_to_agent_language() {
        let det = FixedDetector::new("ko", 0.4);
        let g = identify(&det, "ㅇㅇ", "en", &PipelineConfig::default()).await;
        assert_eq!(g.lang, "en");
        assert_eq!(g.source, LangSource::Agent);
    }

    #[tokio::test]
    async fn very_short_input_with_any_hangul_is_korean() {
        let config = PipelineConfig { hangul_ratio: 0.9, ..PipelineConfig::default() };
        let det = FixedDetector::new("en", 0.99);
        let g = identify(&det, "ok네", "en", &config).await;
        assert_eq!(g.lang, "ko");
        assert_eq!(g.source, LangSource::Hangul);

        // one character longer and the ratio rule alone applies
        let g = identify(&det, "okay네", "en", &config).await;
        assert_eq!(g.lang, "en");
        assert_eq!(g.source, LangSource::Detector);
    }

    #[tokio::test]
    async fn single_character_is_forced_korean() {
        let det = FixedDetector::new("en", 0.99);
        let g = identify(&det, " a ", "en", &PipelineConfig::default()).await;
        assert_eq!(g.lang, "ko");
        assert_eq!(g.source, LangSource::ShortInput);
    }

    #[tokio::test]
    async fn low_confidence_latin_uses_script_hint() {
        let det = FixedDetector::new("fr", 0.6);
        let g = identify(&det, "where is my parcel", "ko", &PipelineConfig::default()).await;
        assert_eq!(g.lang, "en");
        assert_eq!(g.source, LangSource::Script);

        let det = FixedDetector::new("fr", 0.9);
        let g = identify(&det, "où est mon colis", "ko", &PipelineConfig::default()).await;
        assert_eq!(g.lang, "fr");
        assert_eq!(g.source, LangSource::Detector);
    }

    #[tokio::test]
    async fn detector_failure_is_swallowed() {
        let g = identify(&crate::capability::Unavailable, "hello there", "ko", &PipelineConfig::default()).await;
        assert_eq!(g.lang, "en");
    }
}
