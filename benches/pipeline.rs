use aigloss_rs::{ContentSimplifier, GlossaryIndex, Highlighter};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use std::io::{Cursor, Read};
use std::sync::Once;
use zstd::stream::Decoder as ZstdDecoder;

static DATA_BYTES: &[u8] = include_bytes!(env!("GLOSSARY_DATA"));

const EXTRACT: &str = "機械学習（きかいがくしゅう、英: machine learning）とは、経験からの学習により自動で改善するコンピューターアルゴリズムもしくはその研究領域で、人工知能の一種であるとみなされている。\n\n\
訓練データもしくは学習データと呼ばれるデータを使って学習し、学習結果を使って何らかのタスクをこなす。\n\
例えば過去のスパムメールを訓練データとして用いて学習し、スパムフィルタリングというタスクをこなす、といった事が可能となる。\n\
深層学習やニューラルネットワークを用いたモデルが広く使われている。";

fn ensure_loaded() {
    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        let _ = GlossaryIndex::entry_by_id(0);
    });
}

fn bench_cold_load(c: &mut Criterion) {
    c.bench_function("cold_load::decompress_blob", |b| {
        b.iter(|| {
            let mut decoder = ZstdDecoder::new(Cursor::new(DATA_BYTES)).expect("cold-load decoder");
            let mut buf = [0u8; 64 * 1024];
            let mut total = 0usize;
            loop {
                let read = decoder.read(&mut buf).expect("stream read");
                if read == 0 {
                    break;
                }
                total += read;
            }
            black_box(total);
        });
    });
}

fn bench_highlight(c: &mut Criterion) {
    let highlighter = Highlighter::default();
    let once = highlighter.highlight(EXTRACT);
    c.bench_function("highlight::plain", |b| {
        b.iter(|| black_box(highlighter.highlight(black_box(EXTRACT))));
    });
    c.bench_function("highlight::already_highlighted", |b| {
        b.iter(|| black_box(highlighter.highlight(black_box(&once))));
    });
}

fn bench_simplify(c: &mut Criterion) {
    let simplifier = ContentSimplifier::default();
    for max in [1usize, 3, 10] {
        let simplifier = simplifier.clone().with_max_paragraphs(max);
        c.bench_with_input(BenchmarkId::new("simplify", max), &max, |b, _| {
            b.iter(|| black_box(simplifier.simplify(Some(black_box(EXTRACT)))));
        });
    }
}

fn bench_glossary_queries(c: &mut Criterion) {
    ensure_loaded();
    const TERMS: &[&str] = &["人工知能", "機械学習", "トークン"];
    for &term in TERMS {
        c.bench_with_input(BenchmarkId::new("entry_lookup", term), &term, |b, &term| {
            b.iter(|| {
                let entry = GlossaryIndex::entry_by_term(term).expect("entry present");
                black_box(entry.term_id());
                black_box(entry.detail());
            });
        });
    }
    c.bench_function("prefix_lookup::all", |b| {
        b.iter(|| black_box(GlossaryIndex::prefix("", 50).len()));
    });
}

criterion_group!(
    benches,
    bench_cold_load,
    bench_highlight,
    bench_simplify,
    bench_glossary_queries
);
criterion_main!(benches);
