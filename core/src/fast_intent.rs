//! Keyword shortcuts for the most common support requests.
//!
//! A hit returns the stored FAQ answer without touching any language
//! capability.

use crate::faq::FaqItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Refund,
    Exchange,
    Cancel,
    Shipping,
    Restock,
    Address,
    Receipt,
}

struct Rule {
    intent: Intent,
    /// Matched against the input with whitespace removed.
    triggers: &'static [&'static str],
    /// An FAQ question containing any of these answers the intent.
    question_keys: &'static [&'static str],
}

const RULES: &[Rule] = &[
    Rule { intent: Intent::Refund, triggers: &["환불", "환불해줘", "환불할래", "반품"], question_keys: &["환불", "반품"] },
    Rule { intent: Intent::Exchange, triggers: &["교환", "교환해줘"], question_keys: &["교환"] },
    Rule { intent: Intent::Cancel, triggers: &["취소", "주문취소"], question_keys: &["취소"] },
    Rule { intent: Intent::Shipping, triggers: &["배송", "배송조회", "언제와"], question_keys: &["배송"] },
    Rule { intent: Intent::Restock, triggers: &["재입고"], question_keys: &["재입고"] },
    Rule { intent: Intent::Address, triggers: &["주소변경", "주소바꿔"], question_keys: &["주소"] },
    Rule { intent: Intent::Receipt, triggers: &["영수증", "증빙", "현금영수증"], question_keys: &["영수증", "증빙"] },
];

fn squash(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_lowercase()
}

/// First rule whose trigger occurs in `raw`.
pub fn detect_intent(raw: &str) -> Option<Intent> {
    let squashed = squash(raw);
    RULES
        .iter()
        .find(|r| r.triggers.iter().any(|t| squashed.contains(t)))
        .map(|r| r.intent)
}

/// The first stored FAQ whose question names `intent`.
pub fn faq_for_intent(intent: Intent, faqs: &[FaqItem]) -> Option<&FaqItem> {
    let rule = RULES.iter().find(|r| r.intent == intent)?;
    faqs.iter().find(|f| rule.question_keys.iter().any(|k| f.question.contains(k)))
}

/// Detect an intent and pick its FAQ in one step.
pub fn fast_answer<'a>(raw: &str, faqs: &'a [FaqItem]) -> Option<(Intent, &'a FaqItem)> {
    let intent = detect_intent(raw)?;
    let item = faq_for_intent(intent, faqs)?;
    tracing::debug!(?intent, question = %item.question, "fast intent hit");
    Some((intent, item))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triggers_ignore_spacing() {
        assert_eq!(detect_intent("주소 바꿔 주세요"), Some(Intent::Address));
        assert_eq!(detect_intent("언제 와요?"), Some(Intent::Shipping));
        assert_eq!(detect_intent("hello"), None);
    }

    #[test]
    fn refund_wins_over_later_rules() {
        assert_eq!(detect_intent("환불 영수증"), Some(Intent::Refund));
    }

    #[test]
    fn intent_without_faq_is_a_miss() {
        let faqs = vec![FaqItem::new("배송은 얼마나 걸리나요", "2~3일 걸립니다.")];
        assert!(fast_answer("재입고 언제돼요", &faqs).is_none());
        let (intent, item) = fast_answer("배송 조회", &faqs).unwrap();
        assert_eq!(intent, Intent::Shipping);
        assert_eq!(item.answer, "2~3일 걸립니다.");
    }
}
