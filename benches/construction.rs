use criterion::{criterion_group, criterion_main, Criterion};
use genograph_core::{EngineConfig, Genome, GenomeContext, Grammar, HashPurpose};

const GRAMMAR: &str = include_str!("../demos/grammar.json");

fn bench_construction(c: &mut Criterion) {
    let grammar = Grammar::from_json(GRAMMAR).unwrap();
    let mut ctx = GenomeContext::seeded(7);

    c.bench_function("generate_toy_asm", |b| {
        b.iter(|| Genome::generate(&grammar, &mut ctx).unwrap())
    });

    let genome = Genome::generate(&grammar, &mut ctx).unwrap();
    c.bench_function("clone_and_resolve_toy_asm", |b| {
        b.iter(|| {
            let mut copy = genome.clone_genome(&mut ctx.ids);
            copy.attach_floating_edges(&mut ctx);
            copy
        })
    });

    c.bench_function("genotype_hash_toy_asm", |b| {
        b.iter(|| genome.hash(HashPurpose::Genotype))
    });

    let config = EngineConfig::default();
    c.bench_function("diversity_message_toy_asm", |b| {
        b.iter(|| genome.diversity_message(&config))
    });

    let resolved = genome.as_resolved().unwrap();
    c.bench_function("fingerprint_toy_asm", |b| {
        b.iter(|| resolved.fingerprint())
    });
}

criterion_group!(benches, bench_construction);
criterion_main!(benches);
