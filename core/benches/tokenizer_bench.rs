use criterion::{criterion_group, criterion_main, Criterion};
use helpdesk_core::tokenizer::{tag_tokens, tokenize};

const ARTICLE: &str = "Orders ship within 3 days domestically. International orders take 7 to 14 days. \
    주문하신 상품은 영업일 기준 2~3일 내에 출고됩니다. 환불은 수령 후 7일 이내에 요청해 주세요. \
    Refunds are issued to the original payment method once the return is inspected.";

fn bench_tokenize(c: &mut Criterion) {
    let text = ARTICLE.repeat(50);
    c.bench_function("tokenize_article", |b| b.iter(|| tokenize(&text)));
    c.bench_function("tag_tokens_article", |b| b.iter(|| tag_tokens(&text)));
}

criterion_group!(benches, bench_tokenize);
criterion_main!(benches);
