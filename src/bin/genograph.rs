//! Genograph CLI — build, inspect, and compare grammar-bound genomes
//!
//! Commands:
//!   genograph build     — generate random individuals for a grammar
//!   genograph render    — print the program text of a saved genome
//!   genograph validate  — check a saved genome against its grammar
//!   genograph diversity — entropy contribution of a set of genomes
//!   genograph demo      — run a full demo on the bundled grammar

use genograph_core::genome::{IdentityRelabeller, SplicePosition};
use genograph_core::{EngineConfig, Genome, GenomeContext, Grammar, IdGenerator, Message};
use std::env;
use std::path::Path;
use std::sync::Arc;

const CONFIG_ENV: &str = "GENOGRAPH_CONFIG";
const DEMO_GRAMMAR: &str = include_str!("../../demos/grammar.json");

fn print_usage() {
    println!(
        r#"
╔══════════════════════════════════════════════════════════════╗
║        Genograph v0.1 — Genome Graph Engine                  ║
║        Grammar-constrained program graphs                    ║
╚══════════════════════════════════════════════════════════════╝

Usage: genograph <command> [options]

Commands:
  build      <grammar> <out-prefix> [count] [seed]   Generate individuals
  render     <grammar> <genome> [--ids]              Print program text
  validate   <grammar> <genome>...                   Validate saved genomes
  diversity  <grammar> <genome>...                   Entropy per individual
  demo                                               Run full demo

Environment:
  GENOGRAPH_CONFIG   Path to an engine config JSON file
  RUST_LOG           Log filter (default: info)

Examples:
  genograph build demos/grammar.json ind 10 42
  genograph render demos/grammar.json ind-0.json
  genograph diversity demos/grammar.json ind-*.json
  genograph demo
"#
    );
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        return;
    }

    match args[1].as_str() {
        "build" => cmd_build(&args[2..]),
        "render" => cmd_render(&args[2..]),
        "validate" => cmd_validate(&args[2..]),
        "diversity" => cmd_diversity(&args[2..]),
        "demo" => cmd_demo(),
        "help" | "--help" | "-h" => print_usage(),
        other => {
            eprintln!("Unknown command: {}", other);
            print_usage();
        }
    }
}

/// Engine config from `GENOGRAPH_CONFIG`, or the defaults
fn load_config() -> EngineConfig {
    match env::var(CONFIG_ENV) {
        Ok(path) => match EngineConfig::load(Path::new(&path)) {
            Ok(config) => {
                println!("  Loaded engine config from {}", path);
                config
            }
            Err(e) => {
                eprintln!("  Failed to read {}: {}, using defaults", path, e);
                EngineConfig::default()
            }
        },
        Err(_) => EngineConfig::default(),
    }
}

fn load_grammar(path: &str) -> Option<Arc<Grammar>> {
    match Grammar::load(Path::new(path)) {
        Ok(grammar) => Some(grammar),
        Err(e) => {
            eprintln!("  Failed to load grammar {}: {}", path, e);
            None
        }
    }
}

fn load_genome(path: &str, grammar: &Arc<Grammar>, ids: &mut IdGenerator) -> Option<Genome> {
    match Genome::load_json(path, grammar, ids) {
        Ok(genome) => Some(genome),
        Err(e) => {
            eprintln!("  Failed to load genome {}: {}", path, e);
            None
        }
    }
}

fn cmd_build(args: &[String]) {
    if args.len() < 2 {
        eprintln!("Usage: genograph build <grammar> <out-prefix> [count] [seed]");
        return;
    }
    let Some(grammar) = load_grammar(&args[0]) else {
        return;
    };
    let prefix = &args[1];
    let count: usize = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(1);
    let ctx = match args.get(3).and_then(|s| s.parse::<u64>().ok()) {
        Some(seed) => GenomeContext::seeded(seed),
        None => GenomeContext::from_entropy(),
    };
    let mut ctx = ctx.with_config(load_config());

    for i in 0..count {
        let genome = match Genome::generate(&grammar, &mut ctx) {
            Ok(genome) => genome,
            Err(e) => {
                eprintln!("  Generation failed: {}", e);
                return;
            }
        };
        let path = format!("{}-{}.json", prefix, i);
        let resolved = match genome.resolved() {
            Ok(resolved) => resolved,
            Err(e) => {
                eprintln!("  {}", e);
                return;
            }
        };
        match resolved.save_json(&path) {
            Ok(()) => println!(
                "  [{}] {} macros -> {} ({})",
                genome.id(),
                genome.macro_count(),
                path,
                &resolved.fingerprint()[..16]
            ),
            Err(e) => eprintln!("  Failed to save {}: {}", path, e),
        }
    }
}

fn cmd_render(args: &[String]) {
    if args.len() < 2 {
        eprintln!("Usage: genograph render <grammar> <genome> [--ids]");
        return;
    }
    let Some(grammar) = load_grammar(&args[0]) else {
        return;
    };
    let Some(genome) = load_genome(&args[1], &grammar, &mut IdGenerator::new()) else {
        return;
    };
    let resolved = match genome.resolved() {
        Ok(resolved) => resolved,
        Err(e) => {
            eprintln!("  {}", e);
            return;
        }
    };
    if args.iter().any(|a| a == "--ids") {
        print!("{}", resolved.render(&mut IdentityRelabeller));
    } else {
        print!("{}", resolved.render_normalized());
    }
}

fn cmd_validate(args: &[String]) {
    if args.len() < 2 {
        eprintln!("Usage: genograph validate <grammar> <genome>...");
        return;
    }
    let Some(grammar) = load_grammar(&args[0]) else {
        return;
    };
    let mut ids = IdGenerator::new();
    let mut failures = 0;
    for path in &args[1..] {
        let Some(genome) = load_genome(path, &grammar, &mut ids) else {
            failures += 1;
            continue;
        };
        if genome.validate() {
            println!("  {} OK ({} macros)", path, genome.macro_count());
        } else {
            println!("  {} INVALID", path);
            failures += 1;
        }
    }
    if failures > 0 {
        std::process::exit(1);
    }
}

fn cmd_diversity(args: &[String]) {
    if args.len() < 2 {
        eprintln!("Usage: genograph diversity <grammar> <genome>...");
        return;
    }
    let Some(grammar) = load_grammar(&args[0]) else {
        return;
    };
    let config = load_config();
    let mut ids = IdGenerator::new();
    let individuals: Vec<(&String, Message)> = args[1..]
        .iter()
        .filter_map(|path| {
            load_genome(path, &grammar, &mut ids).map(|g| (path, g.diversity_message(&config)))
        })
        .collect();
    report_diversity(&individuals);
}

fn report_diversity<N: std::fmt::Display>(individuals: &[(N, Message)]) {
    let mut population = Message::new();
    for (_, message) in individuals {
        population += message;
    }
    println!(
        "\n  Population: {} individuals, {} symbols ({} distinct), entropy {:.4}",
        individuals.len(),
        population.len(),
        population.distinct(),
        population.entropy()
    );
    for (name, message) in individuals {
        println!(
            "  {:<24} own={:.4} delta={:+.4}",
            name,
            message.entropy(),
            population.delta_entropy(message)
        );
    }
}

fn cmd_demo() {
    println!(
        r#"
╔══════════════════════════════════════════════════════════════╗
║              Genograph v0.1 — Full Demo                      ║
║     Build + Resolve + Edit + Clone + Diversity + Save        ║
╚══════════════════════════════════════════════════════════════╝
"#
    );

    let grammar = match Grammar::from_json(DEMO_GRAMMAR) {
        Ok(grammar) => grammar,
        Err(e) => {
            eprintln!("  Bundled grammar is broken: {}", e);
            return;
        }
    };
    let mut ctx = GenomeContext::seeded(42).with_config(load_config());

    // Step 1: Population
    println!("Step 1: Generating a population of 6...");
    println!("{}", "-".repeat(60));
    let mut population = Vec::new();
    for _ in 0..6 {
        match Genome::generate(&grammar, &mut ctx) {
            Ok(genome) => {
                println!("  {} — {} macros", genome.id(), genome.macro_count());
                population.push(genome);
            }
            Err(e) => {
                eprintln!("  Generation failed: {}", e);
                return;
            }
        }
    }

    // Step 2: Rendering
    println!("\nStep 2: Rendering the first individual...");
    println!("{}", "-".repeat(60));
    if let Some(resolved) = population[0].as_resolved() {
        print!("{}", resolved.render_normalized());
        println!("  fingerprint: {}", resolved.fingerprint());
    }

    // Step 3: Clone
    println!("\nStep 3: Cloning and re-resolving...");
    println!("{}", "-".repeat(60));
    let mut twin = population[0].clone_genome(&mut ctx.ids);
    let resolved = twin.attach_floating_edges(&mut ctx);
    println!(
        "  clone {} resolved={} valid={} equals original={}",
        twin.id(),
        resolved,
        twin.validate(),
        twin.equals(&population[0])
    );

    // Step 4: Crossover-style transplant
    println!("\nStep 4: Transplanting a slice between individuals...");
    println!("{}", "-".repeat(60));
    let mut child = population[1].clone_genome(&mut ctx.ids);
    let donor_len = population[2].subgraph(0, 0).macro_count();
    let mut donor = population[2].clone_genome(&mut ctx.ids);
    let piece = donor.cut_slice(0, 0, 1, donor_len.min(3), &mut ctx.ids);
    match piece {
        Some(piece) => {
            let size = piece.len();
            match child.splice_slice(0, 0, piece, SplicePosition::End) {
                Ok(()) => println!("  spliced {} nodes into {}", size, child.id()),
                Err(_) => println!("  child {} is full, splice refused", child.id()),
            }
        }
        None => println!("  donor {} too small to cut", donor.id()),
    }
    let resolved = child.attach_floating_edges(&mut ctx);
    println!(
        "  child {} resolved={} valid={} macros={}",
        child.id(),
        resolved,
        child.validate(),
        child.macro_count()
    );

    // Step 5: Mutation
    println!("\nStep 5: Mutating parameters...");
    println!("{}", "-".repeat(60));
    let mut mutant = population[3].clone_genome(&mut ctx.ids);
    let mut changed = 0;
    for position in 1..=mutant.subgraph(0, 0).macro_count() {
        if mutant.mutate_parameter(0, 0, position, &mut ctx) {
            changed += 1;
        }
    }
    let resolved = mutant.attach_floating_edges(&mut ctx);
    println!(
        "  mutant {} changed {} nodes, resolved={} valid={}",
        mutant.id(),
        changed,
        resolved,
        mutant.validate()
    );

    // Step 6: Diversity
    println!("\nStep 6: Population diversity...");
    println!("{}", "-".repeat(60));
    let config = ctx.config.clone();
    let individuals: Vec<(String, Message)> = population
        .iter()
        .chain([&twin, &child, &mutant])
        .map(|g| (g.id().to_string(), g.diversity_message(&config)))
        .collect();
    report_diversity(&individuals);

    // Step 7: Save and reload
    println!("\nStep 7: Save and reload...");
    println!("{}", "-".repeat(60));
    let path = env::temp_dir().join("genograph-demo.json");
    let Some(resolved) = population[0].as_resolved() else {
        return;
    };
    if let Err(e) = resolved.save_json(&path) {
        eprintln!("  Failed to save: {}", e);
        return;
    }
    match Genome::load_json(&path, &grammar, &mut ctx.ids) {
        Ok(loaded) => println!(
            "  reloaded {} from {}: valid={} equals saved={}",
            loaded.id(),
            path.display(),
            loaded.validate(),
            loaded.equals(&population[0])
        ),
        Err(e) => eprintln!("  Failed to reload: {}", e),
    }

    println!("\nDemo complete.");
}
