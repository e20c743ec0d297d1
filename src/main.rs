mod config;
mod detailed;
mod empirical;
mod error;
mod evolution;
mod fitness;
mod orchestrator;
mod params;
mod report;
mod rng;
mod target;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use orchestrator::RunOrchestrator;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "pyrocal")]
#[command(version)]
#[command(about = "Calibrates empirical pyrolysis surrogate models against detailed-model yield curves")]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Path to TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Output directory for result artifacts
    #[arg(short, long, global = true, default_value = "results")]
    out: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run every active model and every configured fit
    Run {
        /// Generate JSON result bundles
        #[arg(long)]
        json: bool,
        /// Worker threads for fitness evaluation
        #[arg(long, default_value = "1")]
        workers: usize,
    },
    /// Run a single named fit
    Fit {
        /// Detailed model name
        #[arg(long)]
        model: String,
        /// Fit name within the model section
        #[arg(long)]
        fit: String,
        /// Generate JSON result bundles
        #[arg(long)]
        json: bool,
        /// Worker threads for fitness evaluation
        #[arg(long, default_value = "1")]
        workers: usize,
    },
    /// Validate a configuration file
    Validate,
    /// Print version information
    Version,
}

fn load_config(path: &str) -> Result<(config::Root, String)> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config: {}", path))?;
    let root = config::Root::from_toml(&text)
        .with_context(|| format!("invalid config: {}", path))?;
    Ok((root, text))
}

fn run_one_fit(
    cfg_text: &str,
    model_name: &str,
    fit_name: &str,
    fit: &config::FitSettings,
    run_results: &[(String, target::RunResult)],
    operating_conditions: &[(String, target::OperatingCondition)],
    out_dir: &Path,
    json: bool,
    workers: usize,
) -> Result<()> {
    let family = fit.family()?;
    let space = fit.parameter_space()?;
    let evo_cfg = fit.evolution_config()?;
    let normalization = fit.normalization()?;

    let dataset = RunOrchestrator::narrow(&fit.species, run_results, operating_conditions)?;

    eprintln!(
        "[pyrocal] fit {}-{}: model={} species={} npop={} ngen={} mu={} lambda={} seed={}",
        model_name,
        fit_name,
        fit.model,
        fit.species,
        evo_cfg.npop,
        evo_cfg.ngen,
        evo_cfg.mu,
        evo_cfg.lambda_,
        evo_cfg.seed
    );

    let evaluator =
        fitness::FitnessEvaluator::new(&dataset, &space, family, normalization);
    let mut ga = evolution::Evolution::configure(space.clone(), evo_cfg)?;

    let start = Instant::now();
    let result = ga.run(&|p: &[f64]| evaluator.evaluate(p), workers)?;
    let wall_time_ms = start.elapsed().as_secs_f64() * 1000.0;

    let last = result.log.last().expect("ngen >= 1");
    eprintln!(
        "[pyrocal] fit {}-{}: best_fitness={:.6e} (gen {} min={:.6e} avg={:.6e}) in {:.1}ms",
        model_name, fit_name, result.best_fitness, last.generation, last.min, last.avg, wall_time_ms
    );
    for (name, value) in result.names.iter().zip(result.best.iter()) {
        eprintln!("  {:8} = {:.6e}", name, value);
    }

    let curves = report::predicted_curves(family, &result.best, &dataset);
    let tag = format!("{}-{}", model_name, fit_name);

    let conv_path = out_dir.join(format!("evolution_{}.csv", tag));
    report::write_convergence_csv(&conv_path, &result.log)?;
    eprintln!("[pyrocal] convergence log: {}", conv_path.display());

    let curves_path = out_dir.join(format!("yield_{}.csv", tag));
    report::write_curves_csv(&curves_path, &curves)?;
    eprintln!("[pyrocal] fit curves: {}", curves_path.display());

    if json {
        let bundle = report::FitBundle::new(
            report::Manifest::new(cfg_text),
            model_name,
            fit_name,
            &fit.species,
            &result,
            &curves,
        );
        let json_path = out_dir.join(format!("fit_{}.json", tag));
        report::write_bundle(&json_path, &bundle)?;
        eprintln!("[pyrocal] JSON bundle: {}", json_path.display());
    }

    Ok(())
}

fn run_model(
    cfg: &config::Root,
    cfg_text: &str,
    model_name: &str,
    model_cfg: &config::ModelConfig,
    only_fit: Option<&str>,
    out_dir: &Path,
    json: bool,
    workers: usize,
) -> Result<()> {
    let detailed_model = detailed::resolve(model_name, Path::new(&model_cfg.data_path))?;
    let operating_conditions = cfg.operating_conditions.resolve()?;

    eprintln!(
        "[pyrocal] model {}: {} runs from {}",
        model_name,
        operating_conditions.len(),
        model_cfg.data_path
    );
    let orch = RunOrchestrator::new(
        &*detailed_model,
        &cfg.fuel,
        cfg.operating_conditions.pressure,
    );
    let run_results = orch.run_all(&operating_conditions)?;

    for (fit_name, fit) in &model_cfg.fit {
        if let Some(only) = only_fit {
            if fit_name.as_str() != only {
                continue;
            }
        }
        run_one_fit(
            cfg_text,
            model_name,
            fit_name,
            fit,
            &run_results,
            &operating_conditions,
            out_dir,
            json,
            workers,
        )?;
    }
    Ok(())
}

fn require_active(name: &str, model_cfg: &config::ModelConfig) -> Result<()> {
    if !model_cfg.active {
        anyhow::bail!("model {} is inactive (set active = true in the config)", name);
    }
    Ok(())
}

fn run_all(cfg: &config::Root, cfg_text: &str, out_dir: &Path, json: bool, workers: usize) -> Result<()> {
    for (model_name, model_cfg) in &cfg.models {
        if !model_cfg.active {
            eprintln!("[pyrocal] model {}: inactive, skipped", model_name);
            continue;
        }
        run_model(cfg, cfg_text, model_name, model_cfg, None, out_dir, json, workers)?;
    }
    Ok(())
}

fn validate_config(cfg_path: &str) -> Result<()> {
    let (cfg, _) = load_config(cfg_path)?;

    eprintln!("[pyrocal] config valid: {}", cfg_path);
    eprintln!(
        "  fuel: {} (C={:.2} H={:.2} O={:.2} N={:.2})",
        cfg.fuel.name,
        cfg.fuel.ultimate_analysis.c,
        cfg.fuel.ultimate_analysis.h,
        cfg.fuel.ultimate_analysis.o,
        cfg.fuel.ultimate_analysis.n
    );
    eprintln!(
        "  operating conditions: {} runs at {:.0} Pa",
        cfg.operating_conditions.runs, cfg.operating_conditions.pressure
    );
    for (model_name, model_cfg) in &cfg.models {
        eprintln!(
            "  model {}: active={} fits={}",
            model_name,
            model_cfg.active,
            model_cfg.fit.len()
        );
        for (fit_name, fit) in &model_cfg.fit {
            eprintln!(
                "    fit {}: {} on '{}' ({} params, npop={}, ngen={}, encoding={})",
                fit_name,
                fit.model,
                fit.species,
                fit.parameters_min.len(),
                fit.npop,
                fit.ngen,
                fit.encoding
            );
        }
    }
    Ok(())
}

fn print_version() {
    eprintln!("PYROCAL - Pyrolysis Surrogate Model Calibration");
    eprintln!();
    eprintln!("  Program ID:      {}", report::PROGRAM_ID);
    eprintln!("  Version:         {}", env!("CARGO_PKG_VERSION"));
    eprintln!("  Schema Version:  {}", report::SCHEMA_VERSION);
    eprintln!("  Platform:        {}", std::env::consts::OS);
    eprintln!();
    eprintln!("Empirical model families:");
    eprintln!("  - sfor: single first-order reaction (A, E, y0)");
    eprintln!("  - c2sm: competing two-step model (A1, E1, y1, A2, E2, y2)");
    eprintln!();
    eprintln!("Detailed model boundary:");
    eprintln!("  - tabulated: replays recorded yield tables from per-run CSV files");
    eprintln!();
    eprintln!("Calibration:");
    eprintln!("  - (mu, lambda) evolution strategy, real or binary encoding");
    eprintln!("  - deterministic for a fixed seed, independent of worker count");
    eprintln!("  - artifacts: convergence CSV, target-vs-fit curve CSV, JSON bundle");
}

fn ensure_out_dir(out: &str) -> Result<PathBuf> {
    let dir = PathBuf::from(out);
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create output directory: {}", dir.display()))?;
    Ok(dir)
}

fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Commands::Version => {
            print_version();
            Ok(())
        }
        Commands::Validate => {
            let cfg_path = args.config.context("--config required for validate")?;
            validate_config(&cfg_path)
        }
        Commands::Run { json, workers } => {
            let cfg_path = args.config.context("--config required")?;
            let out_dir = ensure_out_dir(&args.out)?;
            let (cfg, cfg_text) = load_config(&cfg_path)?;
            eprintln!("[pyrocal] {} fuel, {} model section(s)", cfg.fuel.name, cfg.models.len());
            run_all(&cfg, &cfg_text, &out_dir, json, workers)
        }
        Commands::Fit {
            model,
            fit,
            json,
            workers,
        } => {
            let cfg_path = args.config.context("--config required")?;
            let out_dir = ensure_out_dir(&args.out)?;
            let (cfg, cfg_text) = load_config(&cfg_path)?;
            let model_cfg = cfg
                .models
                .get(&model)
                .with_context(|| format!("no [models.{}] section in config", model))?;
            require_active(&model, model_cfg)?;
            if !model_cfg.fit.contains_key(&fit) {
                anyhow::bail!("no [models.{}.fit.{}] section in config", model, fit);
            }
            run_model(
                &cfg,
                &cfg_text,
                &model,
                model_cfg,
                Some(fit.as_str()),
                &out_dir,
                json,
                workers,
            )
        }
    }
}
