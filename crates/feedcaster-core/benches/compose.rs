use chrono::Utc;
use criterion::{criterion_group, criterion_main, Criterion};
use feedcaster_core::compose::*;
use feedcaster_core::config::ComposeConfig;
use feedcaster_core::index::{ContentIndex, SelectionPolicy};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;

fn feed_composer() -> Composer {
    let config = ComposeConfig::new("{title} [{type}] https://redd.it/{id}")
        .with_variable(TemplateVariable::path("{url}", "data.url"))
        .with_variable(TemplateVariable::media_type("{type}", "{url}"))
        .with_variable(TemplateVariable::path("{id}", "data.id"))
        .with_variable(TemplateVariable::path("{title}", "data.title").truncatable());
    Composer::new(&config, ComposeMode::Feed).unwrap()
}

fn bench_render_short(c: &mut Criterion) {
    let composer = feed_composer();
    let record = json!({"data": {
        "id": "abc12",
        "url": "https://i.imgur.com/xyz.jpg",
        "title": "A perfectly normal cat",
        "permalink": "/r/cats/comments/abc12/"
    }});

    c.bench_function("render short title", |b| {
        b.iter(|| composer.render_record(&record, None).unwrap());
    });
}

fn bench_render_truncated(c: &mut Criterion) {
    let composer = feed_composer();
    let title = "Long title with @mentions &amp; entities http://example.com/x ".repeat(20);
    let record = json!({"data": {
        "id": "abc12",
        "url": "https://example.com/article",
        "title": title,
        "permalink": "/r/cats/comments/abc12/"
    }});

    c.bench_function("render truncated title", |b| {
        b.iter(|| composer.render_record(&record, None).unwrap());
    });
}

fn bench_select_least_exposed(c: &mut Criterion) {
    let ids = (0..10_000).map(|i| format!("folder{}/img{}.jpg", i % 50, i));
    let mut index = ContentIndex::from_identifiers(ids, None, Utc::now());
    for i in 0..5_000 {
        index.record_selection(&format!("folder{}/img{}.jpg", i % 50, i));
    }
    let mut rng = StdRng::seed_from_u64(42);

    c.bench_function("select least exposed (10k entries)", |b| {
        b.iter(|| {
            index
                .select(SelectionPolicy::LeastExposed, Some("folder7/"), &mut rng)
                .map(str::len)
        });
    });
}

criterion_group!(
    benches,
    bench_render_short,
    bench_render_truncated,
    bench_select_least_exposed
);
criterion_main!(benches);
