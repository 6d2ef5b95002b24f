#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]

use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use std::process;

use pima::logit::config::AnalysisConfig;
use pima::logit::estimate::PriorChoice;
use pima::logit::pipeline::{
    load_and_prepare, resolve_data_path, run_bayesian, run_case_study, run_mle,
};
use pima::logit::report::MleTable;

#[derive(Clone, Copy, ValueEnum)]
pub enum PriorCli {
    /// Improper uniform prior
    Flat,
    /// Normal intercept, exponential slopes
    Exponential,
}

/// Options shared by every subcommand.
#[derive(Args)]
pub struct CommonArgs {
    /// Path to the comma-separated dataset (overrides `data.path` in the config)
    #[arg(value_name = "DATA")]
    pub data: Option<String>,

    /// TOML configuration file; every field is optional
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Share of each outcome class used for training
    #[arg(long)]
    pub split_fraction: Option<f64>,

    /// Seed for the stratified train/test split
    #[arg(long)]
    pub split_seed: Option<u64>,
}

#[derive(Args)]
pub struct BayesArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    #[arg(long, value_enum, default_value_t = PriorCli::Flat)]
    pub prior: PriorCli,

    /// Iterations discarded before draws are kept
    #[arg(long)]
    pub burn_in: Option<usize>,

    /// Total iterations, burn-in included
    #[arg(long)]
    pub iterations: Option<usize>,

    /// Keep every N-th post-burn-in iteration
    #[arg(long, value_name = "N")]
    pub thin: Option<usize>,

    /// Scale on the proposal covariance factor
    #[arg(long)]
    pub tune: Option<f64>,

    /// Sampler seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Show a progress bar while sampling
    #[arg(long)]
    pub progress: bool,

    /// Write the retained draws to this CSV file
    #[arg(long, value_name = "PATH")]
    pub draws_out: Option<String>,

    /// Write the fitted model (posterior mean and evaluation) to this TOML file
    #[arg(long, value_name = "PATH")]
    pub model_out: Option<String>,
}

#[derive(Args)]
pub struct MleArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Write the fitted model to this TOML file
    #[arg(long, value_name = "PATH")]
    pub model_out: Option<String>,
}

#[derive(Parser)]
#[command(
    name = "pima",
    about = "Bayesian and maximum-likelihood logistic regression for the Pima diabetes data",
    long_about = "Cleans the diabetes dataset, screens correlated measurements, and fits \
                 logistic regressions by random-walk Metropolis and by IRLS, scoring each \
                 on a stratified held-out split."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean the data and print descriptive statistics and correlations
    Explore(CommonArgs),
    /// Fit and evaluate one Bayesian model
    Bayes(BayesArgs),
    /// Fit and evaluate the maximum-likelihood model
    Mle(MleArgs),
    /// Run the whole case study and print the report
    Report(CommonArgs),
}

fn load_config(common: &CommonArgs) -> Result<AnalysisConfig, Box<dyn std::error::Error>> {
    let mut config = match &common.config {
        Some(path) => AnalysisConfig::load(path)?,
        None => AnalysisConfig::default(),
    };
    if let Some(fraction) = common.split_fraction {
        config.split.fraction = fraction;
    }
    if let Some(seed) = common.split_seed {
        config.split.seed = seed;
    }
    config.validate()?;
    Ok(config)
}

fn explore(args: CommonArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&args)?;
    let path = resolve_data_path(args.data.as_deref(), &config)?;
    let prepared = load_and_prepare(path, &config)?;
    print!("{}", prepared.exploration);
    println!(
        "Split: {} training rows, {} test rows",
        prepared.train.len(),
        prepared.test.len()
    );
    Ok(())
}

fn bayes(args: BayesArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&args.common)?;

    let (prior, base) = match args.prior {
        PriorCli::Flat => (PriorChoice::Flat, config.sampler.flat_prior_run()),
        PriorCli::Exponential => (
            PriorChoice::NormalExponential(config.prior),
            config.sampler.custom_prior_run(),
        ),
    };
    let mut sampler = base;
    if let Some(burn_in) = args.burn_in {
        sampler.burn_in = burn_in;
    }
    if let Some(iterations) = args.iterations {
        sampler.iterations = iterations;
    }
    if let Some(thin) = args.thin {
        sampler.thin = thin;
    }
    if let Some(tune) = args.tune {
        sampler.tune = tune;
    }
    if let Some(seed) = args.seed {
        sampler.seed = seed;
    }
    sampler.show_progress = args.progress;
    sampler.validate()?;

    let path = resolve_data_path(args.common.data.as_deref(), &config)?;
    let prepared = load_and_prepare(path, &config)?;
    println!(
        "Fitting {} on {} training rows; {} draws will be retained.",
        prior.method().describe(),
        prepared.train.len(),
        sampler.retained_draws()
    );
    let outcome = run_bayesian(&prepared, &prior, &sampler, &config)?;
    print!("{outcome}");

    if let Some(draws_out) = &args.draws_out {
        outcome.fit.sample.write_csv(draws_out)?;
        println!("Posterior draws written to: {draws_out}");
    }
    if let Some(model_out) = &args.model_out {
        outcome.model.save(model_out)?;
        println!("Model saved to: {model_out}");
    }
    Ok(())
}

fn mle(args: MleArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&args.common)?;
    let path = resolve_data_path(args.common.data.as_deref(), &config)?;
    let prepared = load_and_prepare(path, &config)?;
    let outcome = run_mle(&prepared, &config)?;
    print!("{}", MleTable(&outcome.fit));
    if let Some(evaluation) = &outcome.model.evaluation {
        println!();
        print!("{evaluation}");
    }
    if let Some(model_out) = &args.model_out {
        outcome.model.save(model_out)?;
        println!("Model saved to: {model_out}");
    }
    Ok(())
}

fn report(args: CommonArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&args)?;
    let report = run_case_study(args.data.as_deref(), &config)?;
    print!("{report}");
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let Cli { command } = cli;

    let result = match command {
        Some(Commands::Explore(args)) => explore(args),
        Some(Commands::Bayes(args)) => bayes(args),
        Some(Commands::Mle(args)) => mle(args),
        Some(Commands::Report(args)) => report(args),
        None => {
            Cli::command().print_help().expect("print help");
            println!();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
