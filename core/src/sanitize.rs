//! Pure text heuristics used around language detection.
//!
//! Nothing here is used to shape replies; the output of
//! [`strip_for_detection`] only ever feeds a detector.

use crate::capability::same_language;
use lazy_static::lazy_static;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref URL_OR_EMAIL: Regex =
        Regex::new(r"\b\w+://\S+|\b[\w.+-]+@[\w.-]+\.\w+\b").expect("valid regex");
    static ref JOINERS: Regex = Regex::new(r"[\u{200D}\u{FE0E}\u{FE0F}]").expect("valid regex");
    static ref MARKS: Regex = Regex::new(r"\p{M}+").expect("valid regex");
    static ref PICTOGRAPHS: Regex = Regex::new(
        r"\p{Extended_Pictographic}(?:\u{200D}\p{Extended_Pictographic})*|\p{Emoji_Modifier}"
    )
    .expect("valid regex");
    static ref SPACES: Regex = Regex::new(r"\s+").expect("valid regex");
}

/// Remove URLs, e-mail addresses, emoji and combining marks, then collapse
/// whitespace.
pub fn strip_for_detection(raw: &str) -> String {
    let s: String = raw.nfc().collect();
    let s = URL_OR_EMAIL.replace_all(&s, " ");
    let s = JOINERS.replace_all(&s, "");
    let decomposed: String = s.nfd().collect();
    let s: String = MARKS.replace_all(&decomposed, "").nfc().collect();
    let s = PICTOGRAPHS.replace_all(&s, " ");
    SPACES.replace_all(&s, " ").trim().to_string()
}

pub fn is_hangul_syllable(c: char) -> bool {
    ('\u{AC00}'..='\u{D7A3}').contains(&c)
}

pub fn has_hangul(s: &str) -> bool {
    s.chars().any(is_hangul_syllable)
}

/// Share of Hangul syllables among non-whitespace characters.
pub fn hangul_ratio(s: &str) -> f32 {
    let all = s.chars().filter(|c| !c.is_whitespace()).count().max(1);
    let ko = s.chars().filter(|c| is_hangul_syllable(*c)).count();
    ko as f32 / all as f32
}

/// Guess a language from the scripts present: Hangul beats CJK ideographs,
/// which beat Latin letters.
pub fn script_hint(s: &str) -> Option<&'static str> {
    let has_cjk = s.chars().any(|c| ('\u{4E00}'..='\u{9FFF}').contains(&c));
    let has_latin = s.chars().any(|c| c.is_ascii_alphabetic());
    if has_hangul(s) {
        Some("ko")
    } else if has_cjk {
        Some("ja")
    } else if has_latin {
        Some("en")
    } else {
        None
    }
}

/// Whether `text` is plausibly already written in `lang`.
///
/// Text without any recognizable script agrees with every language.
pub fn script_matches(text: &str, lang: &str) -> bool {
    match script_hint(text) {
        Some(hint) => same_language(hint, lang),
        None => true,
    }
}

pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// First `n` characters of `s`.
pub fn char_prefix(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn is_terminal(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | '。' | '？' | '！')
}

fn is_fullwidth_terminal(c: char) -> bool {
    matches!(c, '。' | '？' | '！')
}

/// Split after runs of sentence-terminal punctuation (`.!?。？！`).
///
/// ASCII terminals only end a sentence when followed by whitespace or the
/// end of text, so "3.5" stays whole; full-width terminals always do.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut iter = text.char_indices().peekable();
    while let Some((i, c)) = iter.next() {
        if !is_terminal(c) {
            continue;
        }
        let mut end = i + c.len_utf8();
        let mut fullwidth = is_fullwidth_terminal(c);
        while let Some(&(j, d)) = iter.peek() {
            if !is_terminal(d) {
                break;
            }
            end = j + d.len_utf8();
            fullwidth |= is_fullwidth_terminal(d);
            iter.next();
        }
        let at_boundary = match iter.peek() {
            None => true,
            Some(&(_, d)) => fullwidth || d.is_whitespace(),
        };
        if at_boundary {
            let piece = text[start..end].trim();
            if !piece.is_empty() {
                out.push(piece);
            }
            start = end;
        }
    }
    let rest = text[start..].trim();
    if !rest.is_empty() {
        out.push(rest);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_noise_before_detection() {
        let out = strip_for_detection("환불 문의 😀 https://shop.example/a?b=1 me@example.com  ");
        assert_eq!(out, "환불 문의");
    }

    #[test]
    fn strips_combining_marks() {
        assert_eq!(strip_for_detection("cafe\u{301}"), "cafe");
    }

    #[test]
    fn hints_by_script() {
        assert_eq!(script_hint("주문 order"), Some("ko"));
        assert_eq!(script_hint("注文"), Some("ja"));
        assert_eq!(script_hint("order"), Some("en"));
        assert_eq!(script_hint("ㅇㅇ"), None);
        assert_eq!(script_hint("1234"), None);
    }

    #[test]
    fn hangul_ratio_ignores_spaces() {
        assert!((hangul_ratio("환불 ab") - 0.5).abs() < f32::EPSILON);
        assert_eq!(hangul_ratio(""), 0.0);
    }

    #[test]
    fn splits_on_terminal_punctuation() {
        assert_eq!(split_sentences("Hi there. Price is 3.5 USD!  Ok?"), vec!["Hi there.", "Price is 3.5 USD!", "Ok?"]);
        assert_eq!(split_sentences("감사합니다。또 오세요"), vec!["감사합니다。", "또 오세요"]);
        assert!(split_sentences("   ").is_empty());
    }

    #[test]
    fn char_prefix_respects_boundaries() {
        assert_eq!(char_prefix("고객님안녕하세요", 3), "고객님");
        assert_eq!(char_prefix("ab", 5), "ab");
    }
}
