use std::time::Instant;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};

use entity_resolution::matching::{CandidateRecord, MatchInput, Matcher};
use entity_resolution::resolver::{Collaborators, ResolutionRequest, Resolver};
use entity_resolution::{Config, Entity, EntityType, MatchingConfig, Standardizer, Value, ValueMap};

const FIRST: [&str; 8] = ["james", "mary", "robert", "patricia", "john", "jennifer", "michael", "linda"];
const LAST: [&str; 8] = ["smith", "johnson", "williams", "brown", "jones", "garcia", "miller", "davis"];

fn pool(matcher: &Matcher, size: usize) -> Vec<CandidateRecord> {
    (0..size)
        .map(|i| {
            let name = format!("{} {} {}", FIRST[i % 8], LAST[(i / 8) % 8], i);
            let entity = Entity::new(name.clone(), name, EntityType::Person)
                .with_identifier("email", format!("user{i}@example.com"))
                .with_identifier("phone", format!("555{i:07}"));
            CandidateRecord::from_entity(&entity, matcher.standardizer())
        })
        .collect()
}

fn bench_standardize(c: &mut Criterion) {
    let standardizer = Standardizer::new();
    c.bench_function("standardize/record", |b| {
        let mut ids = ValueMap::new();
        ids.insert("email".into(), Value::from("Jane.Doe+promo@GoogleMail.com"));
        ids.insert("phone".into(), Value::from("+1 (555) 123-4567 x12"));
        ids.insert("address".into(), Value::from("123 Main St., Springfield, IL 62704"));
        b.iter(|| standardizer.record("Dr. Robert J. O'Brien Jr.", &ids, &ValueMap::new()));
    });
}

fn bench_find_matches(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_matches");
    for size in [100usize, 1_000] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_function(format!("pool_{size}"), |b| {
            let matcher = Matcher::new(MatchingConfig::default());
            let candidates = pool(&matcher, size);
            let mut ids = ValueMap::new();
            ids.insert("email".into(), Value::from("user42@example.com"));
            let input = MatchInput::new(
                matcher.standardizer().record("James Brown", &ids, &ValueMap::new()),
                &ids,
            );

            b.iter_custom(|iters| {
                let start = Instant::now();
                for _ in 0..iters {
                    let _ = matcher.find_matches(&input, candidates.clone());
                }
                start.elapsed()
            });
        });
    }
    group.finish();
}

fn bench_resolve(c: &mut Criterion) {
    c.bench_function("resolver/resolve_existing_identity", |b| {
        // Fresh resolver per sample; setup excluded from timing.
        b.iter_custom(|iters| {
            let resolver = Resolver::new(&Config::default(), Collaborators::in_memory()).unwrap();
            for i in 0..256 {
                let request = ResolutionRequest::new("person", format!("{} {}", FIRST[i % 8], LAST[i % 8]))
                    .with_identifier("ssn", format!("{i:09}"));
                resolver.resolve(&request).unwrap();
            }

            let request = ResolutionRequest::new("person", "Mary Johnson").with_identifier("ssn", "000000001");
            let start = Instant::now();
            for _ in 0..iters {
                let _ = resolver.resolve(&request).unwrap();
            }
            start.elapsed()
        });
    });
}

criterion_group!(benches, bench_standardize, bench_find_matches, bench_resolve);
criterion_main!(benches);
