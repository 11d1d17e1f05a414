use super::FaqItem;
use crate::tokenizer::tag_tokens;
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrefilterHit {
    pub index: usize,
    pub overlap: usize,
    pub jaccard: f32,
}

/// Shortlist FAQs whose tags overlap the query.
///
/// Query tokens come from the raw text plus its English rendering when one
/// is given. A FAQ is kept when it shares at least one tag or its Jaccard
/// similarity reaches `min_jaccard`; hits are ordered by overlap, then
/// Jaccard, then position.
pub fn prefilter(
    raw: &str,
    english: Option<&str>,
    faqs: &[FaqItem],
    limit: usize,
    min_jaccard: f32,
) -> Vec<PrefilterHit> {
    if faqs.is_empty() {
        return Vec::new();
    }
    let mut query: HashSet<String> = tag_tokens(raw).into_iter().collect();
    if let Some(en) = english {
        query.extend(tag_tokens(en));
    }

    let mut hits: Vec<PrefilterHit> = faqs
        .iter()
        .enumerate()
        .filter_map(|(index, faq)| {
            let tags = faq.tag_set();
            let overlap = tags.iter().filter(|t| query.contains(*t)).count();
            let union = tags.union(&query).count().max(1);
            let jaccard = overlap as f32 / union as f32;
            (overlap > 0 || jaccard >= min_jaccard).then_some(PrefilterHit { index, overlap, jaccard })
        })
        .collect();

    hits.sort_by(|a, b| {
        b.overlap
            .cmp(&a.overlap)
            .then(b.jaccard.partial_cmp(&a.jaccard).unwrap_or(std::cmp::Ordering::Equal))
    });
    hits.truncate(limit);
    tracing::debug!(query_tokens = query.len(), hits = hits.len(), "faq prefilter");
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    fn faqs() -> Vec<FaqItem> {
        vec![
            FaqItem::new("배송 기간", "2~3일").with_tags(["배송", "shipping", "delivery"]),
            FaqItem::new("환불 방법", "매장 방문").with_tags(["환불", "refund", "return"]),
            FaqItem::new("영업 시간", "10시~7시").with_tags(["영업", "hours"]),
        ]
    }

    #[test]
    fn keeps_overlapping_faqs_only() {
        let hits = prefilter("환불해주세요", Some("please refund me"), &faqs(), 5, 0.15);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].index, 1);
        assert_eq!(hits[0].overlap, 2);
    }

    #[test]
    fn orders_by_overlap() {
        let hits = prefilter("refund shipping delivery", None, &faqs(), 5, 0.15);
        assert_eq!(hits.iter().map(|h| h.index).collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn caps_the_shortlist() {
        let many: Vec<FaqItem> = (0..9).map(|i| FaqItem::new(&format!("q{i}"), "a").with_tags(["refund"])).collect();
        let hits = prefilter("refund", None, &many, 5, 0.15);
        assert_eq!(hits.len(), 5);
        assert!(hits.iter().all(|h| h.overlap > 0 || h.jaccard >= 0.15));
    }
}
