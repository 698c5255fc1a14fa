//! SM-050: CLI subcommands (solve, extract, preprocess, check-config).

use crate::cache::{FileCache, FsLoader, HashedPathResolver};
use crate::core::orchestrator::{solvers_from_tree, Orchestrator};
use crate::core::{config, types};
use crate::extract::templates;
use crate::pool::preprocess::EstreePreprocessor;
use crate::pool::WorkerPool;
use clap::Subcommand;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Produce the canonical solver for a cached player script
    Solve {
        /// Player script URL (or any stable identity)
        identity: String,

        /// Path to sigsmith.yaml
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Cache directory (overrides config)
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Print the solver as ESTree JSON instead of JavaScript
        #[arg(long)]
        json: bool,
    },

    /// Run the extractor over a preprocessed ESTree JSON file
    Extract {
        /// ESTree Program JSON
        file: PathBuf,

        /// Print the solver as ESTree JSON instead of JavaScript
        #[arg(long)]
        json: bool,
    },

    /// Run the preprocessing transform through the worker pool
    Preprocess {
        /// ESTree Program JSON of the raw script
        file: PathBuf,

        /// Write output here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Path to sigsmith.yaml
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Validate sigsmith.yaml and the built-in templates
    CheckConfig {
        /// Path to sigsmith.yaml
        #[arg(short, long, default_value = "sigsmith.yaml")]
        file: PathBuf,
    },
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> Result<(), String> {
    match cmd {
        Commands::Solve {
            identity,
            config,
            cache_dir,
            json,
        } => {
            let mut cfg = load_and_validate(config.as_deref())?;
            check_templates()?;
            if let Some(dir) = cache_dir {
                cfg.cache_dir = dir;
            }
            let rendered = cmd_solve(&cfg, &identity, json)?;
            println!("{}", rendered);
            Ok(())
        }
        Commands::Extract { file, json } => {
            check_templates()?;
            println!("{}", cmd_extract(&file, json)?);
            Ok(())
        }
        Commands::Preprocess {
            file,
            output,
            config,
        } => {
            let cfg = load_and_validate(config.as_deref())?;
            check_templates()?;
            cmd_preprocess(&cfg, &file, output.as_deref())
        }
        Commands::CheckConfig { file } => cmd_check_config(&file),
    }
}

/// Load config (file optional), overlay env, and validate.
fn load_and_validate(path: Option<&Path>) -> Result<types::SolverConfig, String> {
    let cfg = config::load(path)?;
    let errors = config::validate_config(&cfg);
    if errors.is_empty() {
        return Ok(cfg);
    }
    for e in &errors {
        eprintln!("  ERROR: {}", e);
    }
    Err("validation failed".to_string())
}

/// Compile the built-in templates before serving a request.
fn check_templates() -> Result<usize, String> {
    templates::validate_builtin().map_err(|(name, e)| format!("template '{}': {}", name, e))
}

fn runtime() -> Result<tokio::runtime::Runtime, String> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("cannot start runtime: {}", e))
}

fn render(solvers: &types::Solvers, json: bool) -> Result<String, String> {
    if !json {
        if let Some(js) = solvers.sig.to_js() {
            return Ok(js);
        }
    }
    serde_json::to_string_pretty(&solvers.sig.to_estree())
        .map_err(|e| format!("serialize error: {}", e))
}

fn cmd_solve(cfg: &types::SolverConfig, identity: &str, json: bool) -> Result<String, String> {
    let rt = runtime()?;
    let solvers = rt.block_on(async {
        let pool = WorkerPool::from_config(
            cfg,
            Arc::new(EstreePreprocessor::new(cfg.max_payload_bytes)),
        )
        .map_err(|e| e.to_string())?;
        let orchestrator = Orchestrator::new(
            Arc::new(HashedPathResolver::new(&cfg.cache_dir)),
            Arc::new(FsLoader),
            pool,
        )
        .with_preprocessed_cache(Arc::new(FileCache::new(&cfg.cache_dir, "preprocessed")))
        .with_solver_cache(Arc::new(FileCache::new(&cfg.cache_dir, "solvers")));
        orchestrator
            .get_solvers(identity)
            .await
            .map_err(|e| e.to_string())
    })?;
    match solvers {
        Some(solvers) => render(&solvers, json),
        None => Err(format!("no solvers found for {}", identity)),
    }
}

fn cmd_extract(file: &Path, json: bool) -> Result<String, String> {
    let content = std::fs::read_to_string(file)
        .map_err(|e| format!("failed to read {}: {}", file.display(), e))?;
    match solvers_from_tree(&content).map_err(|e| e.to_string())? {
        Some(solvers) => render(&solvers, json),
        None => Err(format!("no decipher function found in {}", file.display())),
    }
}

fn cmd_preprocess(
    cfg: &types::SolverConfig,
    file: &Path,
    output: Option<&Path>,
) -> Result<(), String> {
    let content = std::fs::read_to_string(file)
        .map_err(|e| format!("failed to read {}: {}", file.display(), e))?;
    let rt = runtime()?;
    let pruned = rt.block_on(async {
        let pool = WorkerPool::from_config(
            cfg,
            Arc::new(EstreePreprocessor::new(cfg.max_payload_bytes)),
        )
        .map_err(|e| e.to_string())?;
        pool.execute(content).await.map_err(|e| e.to_string())
    })?;
    match output {
        Some(path) => std::fs::write(path, &pruned)
            .map_err(|e| format!("cannot write {}: {}", path.display(), e)),
        None => {
            println!("{}", pruned);
            Ok(())
        }
    }
}

fn cmd_check_config(file: &Path) -> Result<(), String> {
    let cfg = config::parse_config_file(file)?;
    let mut problems: Vec<String> = config::validate_config(&cfg)
        .into_iter()
        .map(|e| e.to_string())
        .collect();
    let template_nodes = match check_templates() {
        Ok(n) => n,
        Err(e) => {
            problems.push(e);
            0
        }
    };

    if problems.is_empty() {
        println!(
            "OK: {} slot(s), {}ms timeout, {} template nodes",
            cfg.concurrency, cfg.task_timeout_ms, template_nodes
        );
        Ok(())
    } else {
        for p in &problems {
            eprintln!("  ERROR: {}", p);
        }
        Err(format!("{} validation error(s)", problems.len()))
    }
}
