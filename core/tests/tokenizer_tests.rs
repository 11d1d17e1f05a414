use helpdesk_core::tokenizer::{tag_tokens, tokenize};

#[test]
fn it_normalizes_and_stems() {
    let words = tokenize("Running Runners RUN! Ｏｒｄｅｒｓ");
    assert!(words.contains(&"run".to_string()));
    // NFKC folds full-width letters before stemming
    assert!(words.contains(&"order".to_string()));
}

#[test]
fn it_filters_stopwords() {
    let words = tokenize("The quick brown fox and the lazy dog");
    assert!(!words.contains(&"the".to_string()));
    assert!(!words.contains(&"and".to_string()));
}

#[test]
fn it_leaves_korean_untouched() {
    assert_eq!(tokenize("환불 문의드립니다"), vec!["환불".to_string(), "문의드립니다".to_string()]);
}

#[test]
fn tags_mix_scripts() {
    let tags = tag_tokens("교환 가능한가요? Exchange policy");
    assert_eq!(tags, vec!["교환".to_string(), "가능한가요".to_string(), "exchange".to_string(), "policy".to_string()]);
}
