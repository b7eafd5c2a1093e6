//! TWEANN - CLI Entry Point
//!
//! Runs the bundled XOR experiment.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tweann::checkpoint::{Checkpoint, CheckpointManager};
use tweann::experiments::XorExperiment;
use tweann::neural::NeuronCatalog;
use tweann::{Config, Controller, NeatContext, RunOutcome};

#[derive(Parser)]
#[command(name = "tweann")]
#[command(version)]
#[command(about = "NEAT: evolving neural network weights and topologies")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a new XOR experiment
    Run {
        /// Configuration file (YAML)
        #[arg(short, long, default_value = "config.yaml")]
        config: PathBuf,

        /// Override max_generations
        #[arg(short, long)]
        generations: Option<u64>,

        /// Output directory for checkpoints and reports
        #[arg(short, long, default_value = "output")]
        output: PathBuf,

        /// Random seed for reproducibility
        #[arg(long)]
        seed: Option<u64>,

        /// Generations between checkpoints
        #[arg(long, default_value = "50")]
        checkpoint_interval: u64,
    },

    /// Resume a run from checkpoint
    Resume {
        /// Checkpoint file to resume from
        #[arg(short, long)]
        checkpoint: PathBuf,

        /// Additional generations
        #[arg(short, long, default_value = "100")]
        generations: u64,

        /// Output directory
        #[arg(short, long, default_value = "output")]
        output: PathBuf,

        /// Generations between checkpoints
        #[arg(long, default_value = "50")]
        checkpoint_interval: u64,
    },

    /// Generate default configuration file
    Init {
        /// Output path
        #[arg(short, long, default_value = "config.yaml")]
        output: PathBuf,
    },

    /// Summarize a checkpoint file
    Inspect {
        /// Checkpoint file
        checkpoint: PathBuf,

        /// Print the gene listing of the best critter
        #[arg(long)]
        best: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            generations,
            output,
            seed,
            checkpoint_interval,
        } => run_experiment(config, generations, output, seed, checkpoint_interval),

        Commands::Resume {
            checkpoint,
            generations,
            output,
            checkpoint_interval,
        } => resume_experiment(checkpoint, generations, output, checkpoint_interval),

        Commands::Init { output } => {
            init_logging("info");
            generate_config(output)
        }

        Commands::Inspect { checkpoint, best } => {
            init_logging("warn");
            inspect_checkpoint(checkpoint, best)
        }
    }
}

/// `RUST_LOG` wins over the configured level
fn init_logging(level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn run_experiment(
    config_path: PathBuf,
    generations: Option<u64>,
    output: PathBuf,
    seed: Option<u64>,
    checkpoint_interval: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = if config_path.exists() {
        Config::from_file(&config_path)?
    } else {
        Config::default()
    };
    init_logging(&config.logging.log_level);
    if config_path.exists() {
        log::info!("config: loaded {}", config_path.display());
    } else {
        log::info!("config: {} not found, using defaults", config_path.display());
    }

    if let Some(s) = seed {
        config.run.seed = Some(s);
    }
    if let Some(g) = generations {
        config.run.max_generations = g;
    }

    let ctx = NeatContext::new(config)?;
    let xor = XorExperiment::for_context(&ctx);
    println!("Starting XOR experiment");
    println!("  Seed: {}", ctx.seed());
    println!("  Inputs: {}", xor.inputs);
    println!("  Population: {}", ctx.config.population.population_size);
    println!("  Max generations: {}", ctx.config.run.max_generations);
    println!();

    let mut controller = Controller::new(ctx, xor.hooks())?;
    drive(&mut controller, &output, checkpoint_interval)?;
    finish(&controller, &xor, &output)
}

fn resume_experiment(
    checkpoint_path: PathBuf,
    generations: u64,
    output: PathBuf,
    checkpoint_interval: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut checkpoint = Checkpoint::load(&checkpoint_path)?;
    init_logging(&checkpoint.config.logging.log_level);

    checkpoint.config.run.max_generations = checkpoint.generation + generations;
    println!("Resumed at generation {}", checkpoint.generation);
    println!("Critters: {}", checkpoint.population.len());
    println!("Running {} additional generations", generations);
    println!();

    let probe = NeatContext::new(checkpoint.config.clone())?;
    let xor = XorExperiment::for_context(&probe);
    let mut controller = Controller::from_checkpoint(checkpoint, NeuronCatalog::new(), xor.hooks())?;
    drive(&mut controller, &output, checkpoint_interval)?;
    finish(&controller, &xor, &output)
}

fn drive(
    controller: &mut Controller,
    output: &Path,
    checkpoint_interval: u64,
) -> Result<RunOutcome, Box<dyn std::error::Error>> {
    let mut manager = CheckpointManager::new(output, checkpoint_interval, 10)?;
    let start = Instant::now();

    let outcome = controller.run_with_callback(|c| {
        if manager.should_save(c.generation()) {
            manager.save(&c.create_checkpoint())?;
        }
        Ok(())
    })?;

    let elapsed = start.elapsed();
    println!();
    println!("=== Run Complete ===");
    println!("Stopped: {:?}", outcome.reason);
    println!("Generations: {}", outcome.generations);
    println!("Time: {:.2}s", elapsed.as_secs_f64());
    println!(
        "Speed: {:.2} generations/s",
        outcome.generations as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
    );
    if let Some(report) = &outcome.last_report {
        println!("{}", report.summary());
    }
    Ok(outcome)
}

fn finish(
    controller: &Controller,
    xor: &XorExperiment,
    output: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(best) = controller.best_critter() {
        let mut best = best.clone();
        println!();
        println!("Solves XOR: {}", xor.solves(&mut best));
        println!("{}", best.report());
    }

    let final_path = output.join("final.bin");
    controller.create_checkpoint().save(&final_path)?;
    println!("Final checkpoint: {}", final_path.display());

    let reports_path = output.join("reports.json");
    controller.reports().save(&reports_path)?;
    println!("Report history: {}", reports_path.display());

    Ok(())
}

fn generate_config(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    config.save(&output)?;
    println!("Configuration saved to: {}", output.display());
    Ok(())
}

fn inspect_checkpoint(checkpoint_path: PathBuf, best: bool) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Checkpoint Summary ===");
    println!("File: {}", checkpoint_path.display());
    println!();

    let checkpoint = Checkpoint::load(&checkpoint_path)?;
    let critters = &checkpoint.population.critters;

    println!("Generation: {}", checkpoint.generation);
    println!("Seed: {}", checkpoint.random_seed);
    println!("Critters: {}", critters.len());
    println!("Last innovation: {}", checkpoint.counters.innovation);
    println!("Reports: {}", checkpoint.history.len());

    if !critters.is_empty() {
        let genes: usize = critters
            .iter()
            .flat_map(|c| c.genotypes.values())
            .map(|g| g.genes.len())
            .sum();
        let neurons: usize = critters
            .iter()
            .flat_map(|c| c.genotypes.values())
            .map(|g| g.neurons.len())
            .sum();
        println!(
            "Average genes: {:.2}",
            genes as f64 / critters.len() as f64
        );
        println!(
            "Average neurons: {:.2}",
            neurons as f64 / critters.len() as f64
        );
    }

    if let Some(report) = checkpoint.history.latest() {
        println!();
        println!("Latest: {}", report.summary());
    }

    if best {
        println!();
        match (checkpoint.history.latest(), checkpoint.best_critter()) {
            (Some(report), Some(critter)) => {
                println!("Best of generation {} (fitness {:.6})", report.generation, report.fitness.best);
                println!("{}", critter.report());
            }
            (Some(report), None) => println!(
                "Best critter {} of generation {} was not carried over",
                report.best_critter, report.generation
            ),
            (None, _) => println!("No generation has been evaluated yet"),
        }
    }

    println!();
    println!(
        "Checkpoint size: {:.2} KB",
        checkpoint.size_bytes() as f64 / 1_000.0
    );

    Ok(())
}
