use helpdesk_core::capability::TranslatorCache;
use helpdesk_core::faq::{enrich_faq, prefilter, FaqDraft, FaqItem, MAX_TAGS};
use helpdesk_core::testing::{FixedDetector, MapTranslator, ScriptedGenerator};
use helpdesk_core::Capabilities;
use std::sync::Arc;

fn faqs() -> Vec<FaqItem> {
    vec![
        FaqItem::new("환불 어떻게 하나요", "영수증을 지참해 매장에 방문해주세요.").with_tags(["환불", "refund", "return"]),
        FaqItem::new("Can I change my delivery date?", "Yes, from the My Orders page.").with_tags(["delivery", "date", "change"]),
        FaqItem::new("Do you ship abroad?", "We ship to 20 countries."),
    ]
}

#[test]
fn prefilter_respects_limit_and_threshold() {
    let many: Vec<FaqItem> =
        (0..12).map(|i| FaqItem::new(&format!("refund question {i}"), "answer").with_tags(["refund"])).collect();
    let hits = prefilter("refund please", None, &many, 5, 0.15);
    assert_eq!(hits.len(), 5);
    for hit in &hits {
        assert!(hit.overlap > 0 || hit.jaccard >= 0.15);
    }
}

#[test]
fn prefilter_uses_english_rendering() {
    let hits = prefilter("반품하고 싶어요", Some("I want to return it"), &faqs(), 5, 0.15);
    assert_eq!(hits[0].index, 0);
}

#[test]
fn untagged_records_fall_back_to_question_tokens() {
    let hits = prefilter("ship to japan?", None, &faqs(), 5, 0.15);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].index, 2);
}

#[tokio::test]
async fn enrichment_keeps_answer_and_derives_tags() {
    let translator = MapTranslator::new().with("ko", "en", "교환 가능한가요", "Can I exchange it");
    let generator = ScriptedGenerator::new().on("intent keywords", "exchange, swap, a, Return-Item");
    let caps = Capabilities::new(Arc::new(FixedDetector::new("ko", 0.98)), Arc::new(translator), Arc::new(generator));
    let mut translators = TranslatorCache::new();

    let draft = FaqDraft {
        question: "교환 가능한가요".to_string(),
        answer: "  수령 후 7일 이내 가능합니다. ".to_string(),
        doc_id: Some("a2".to_string()),
    };
    let item = enrich_faq(draft, &caps, &mut translators).await;
    assert_eq!(item.answer, "  수령 후 7일 이내 가능합니다. ");
    assert_eq!(item.lang.as_deref(), Some("ko"));
    assert_eq!(item.normalized_question.en.as_deref(), Some("Can I exchange it"));
    assert_eq!(item.normalized_question.ko.as_deref(), Some("교환 가능한가요"));
    assert_eq!(item.doc_id.as_deref(), Some("a2"));
    assert!(item.tags.contains(&"교환".to_string()));
    assert!(item.tags.contains(&"exchange".to_string()));
    assert!(item.tags.contains(&"swap".to_string()));
    assert!(item.tags.contains(&"returnitem".to_string()));
    assert!(!item.tags.iter().any(|t| t.chars().count() < 2));
    assert!(item.tags.len() <= MAX_TAGS);
    assert!(!item.date.is_empty());
}

#[tokio::test]
async fn enrichment_survives_missing_capabilities() {
    let caps = Capabilities::offline();
    let mut translators = TranslatorCache::new();
    let draft = FaqDraft { question: "How long is shipping?".to_string(), answer: "3 days.".to_string(), doc_id: None };
    let item = enrich_faq(draft, &caps, &mut translators).await;
    assert_eq!(item.lang.as_deref(), Some("en"));
    assert_eq!(item.tags, vec!["long".to_string(), "shipping".to_string()]);
}
