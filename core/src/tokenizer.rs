use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref RE: Regex = Regex::new(r"(?u)[\p{L}\p{N}]+(?:'\p{L}+)*").expect("valid regex");
    static ref TAG_RE: Regex = Regex::new(r"[가-힣]+|[a-z0-9]+").expect("valid regex");
    static ref KO_SUFFIX: Regex =
        Regex::new(r"(입니다|합니다|해요|했어요|하고|이면요|이면|인가요|할래요|해주세요|해줘)$").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","aren't","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","can't","cannot","could","couldn't",
            "did","didn't","do","does","doesn't","doing","don't","down","during",
            "each","few","for","from","further",
            "had","hadn't","has","hasn't","have","haven't","having","he","he'd","he'll","he's","her","here","here's","hers","herself","him","himself","his","how","how's",
            "i","i'd","i'll","i'm","i've","if","in","into","is","isn't","it","it's","its","itself",
            "let's","me","more","most","mustn't","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","she'd","she'll","she's","should","shouldn't","so","some","such",
            "than","that","that's","the","their","theirs","them","themselves","then","there","there's","these","they","they'd","they'll","they're","they've","this","those","through","to","too",
            "under","until","up","very",
            "was","wasn't","we","we'd","we'll","we're","we've","were","weren't","what","what's","when","when's","where","where's","which","while","who","who's","whom","why","why's","with","won't","would","wouldn't",
            "you","you'd","you'll","you're","you've","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

pub fn is_stopword(token: &str) -> bool { STOPWORDS.contains(token) }

fn is_latin_token(token: &str) -> bool {
    token.chars().all(|c| c.is_ascii_alphanumeric() || c == '\'' || (c.is_alphabetic() && (c as u32) < 0x0250))
}

/// Index/query tokenizer: NFKC, lowercase, letter/digit runs.
///
/// Latin-script words drop English stopwords and are stemmed; every other
/// script passes through unchanged.
pub fn tokenize(text: &str) -> Vec<String> {
    let normalized = text.nfkc().collect::<String>().to_lowercase();
    let mut tokens = Vec::new();
    for mat in RE.find_iter(&normalized) {
        let token = mat.as_str();
        if is_latin_token(token) {
            if is_stopword(token) { continue; }
            tokens.push(STEMMER.stem(token).to_string());
        } else {
            tokens.push(token.to_string());
        }
    }
    tokens
}

/// Strip one common Korean verb ending ("환불해주세요" -> "환불").
///
/// A token made only of an ending is returned unchanged.
pub fn strip_korean_suffix(token: &str) -> &str {
    match KO_SUFFIX.find(token) {
        Some(m) if m.start() > 0 => &token[..m.start()],
        _ => token,
    }
}

/// Tag tokenizer for FAQ matching: Hangul runs and lowercase ASCII
/// alphanumerics, with Korean endings stripped and English stopwords dropped.
pub fn tag_tokens(text: &str) -> Vec<String> {
    let normalized = text.to_lowercase();
    TAG_RE
        .find_iter(&normalized)
        .map(|m| m.as_str())
        .filter(|t| !is_stopword(t))
        .map(|t| strip_korean_suffix(t).to_string())
        .collect()
}
