use criterion::{Criterion, criterion_group, criterion_main};
use smart_lawyer::documents::split_pages;
use smart_lawyer::embeddings::{ChunkingConfig, chunk_pages, split_text};
use std::hint::black_box;

const CLAUSES: [&str; 5] = [
    "All legislative Powers herein granted shall be vested in a Congress of the United States, which shall consist of a Senate and House of Representatives.",
    "No Person shall be a Representative who shall not have attained to the Age of twenty five Years, and been seven Years a Citizen of the United States.",
    "The House of Representatives shall chuse their Speaker and other Officers; and shall have the sole Power of Impeachment.",
    "Each House shall be the Judge of the Elections, Returns and Qualifications of its own Members, and a Majority of each shall constitute a Quorum to do Business.",
    "The Senators and Representatives shall receive a Compensation for their Services, to be ascertained by Law, and paid out of the Treasury of the United States.",
];

/// Forty pages of clause text separated by form feeds
fn corpus() -> String {
    (0..40)
        .map(|page| {
            (0..12)
                .map(|i| CLAUSES[(page + i) % CLAUSES.len()])
                .collect::<Vec<_>>()
                .join(if page % 2 == 0 { " " } else { "\n\n" })
        })
        .collect::<Vec<_>>()
        .join("\x0C")
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let text = corpus();
    let pages = split_pages(&text);
    let config = ChunkingConfig::default();

    c.bench_function("chunk_pages", |b| {
        b.iter(|| chunk_pages(black_box(&pages), black_box(&config)));
    });

    let single_page: String = text.replace('\x0C', " ");
    c.bench_function("split_text", |b| {
        b.iter(|| split_text(black_box(&single_page), black_box(&config)));
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
