//! Sensei CLI - watch-mode supervisor for katas

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use sensei::check::{RunMode, TestExecutor};
use sensei::error::{FixSuggestion, Result, SenseiError};
use sensei::hint::{create_service, HintAdvisor, HintContext, OfflineService, RateLimiter, ReasoningService};
use sensei::{Kata, RunOutcome, SenseiConfig, WatchSupervisor};

const LOG_FILE: &str = "sensei.log";

#[derive(Parser)]
#[command(name = "sensei")]
#[command(about = "Sensei - watch-mode supervisor for katas")]
#[command(version)]
struct Cli {
    /// Directory holding one sub-directory per kata
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Notes directory (hint log, session log)
    #[arg(long, global = true)]
    notes_root: Option<PathBuf>,

    /// Override the reasoning provider (ollama, openrouter, offline)
    #[arg(long, global = true)]
    provider: Option<String>,

    /// Override the reasoning model
    #[arg(long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch a kata: rerun tests on save, hotkeys for hints
    Watch {
        /// Kata slug under --root (defaults to the current directory)
        project: Option<String>,
    },

    /// Run a kata's tests once and print the failure digest
    Check {
        /// Kata slug under --root (defaults to the current directory)
        project: Option<String>,

        /// Run a single test by name
        #[arg(short, long)]
        test: Option<String>,

        /// Enforce the preview timeout
        #[arg(long)]
        preview: bool,

        /// Skip the diagnosis from the reasoning service
        #[arg(long)]
        offline: bool,
    },

    /// Ask for a hint outside watch mode
    Hint {
        /// Kata slug under --root
        project: String,

        /// Question for the tutor
        #[arg(short, long)]
        question: Option<String>,

        /// Skip the reasoning service and use the fallback suggestions
        #[arg(long)]
        offline: bool,

        /// Print the prompt instead of sending it
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (ignore if not present)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let result = match load_config(&cli) {
        Ok(config) => {
            init_tracing(&cli.command, &config.paths.notes_root);
            match cli.command {
                Commands::Watch { project } => watch(&config, project.as_deref()).await,
                Commands::Check {
                    project,
                    test,
                    preview,
                    offline,
                } => check(&config, project.as_deref(), test.as_deref(), preview, offline).await,
                Commands::Hint {
                    project,
                    question,
                    offline,
                    dry_run,
                } => hint(&config, &project, question.as_deref(), offline, dry_run).await,
            }
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            if let Some(suggestion) = e.fix_suggestion() {
                eprintln!("  {} {}", "Fix:".yellow(), suggestion);
            }
            std::process::exit(1);
        }
    }
}

/// File, then environment, then flags
fn load_config(cli: &Cli) -> Result<SenseiConfig> {
    let mut config = SenseiConfig::load()?.with_env();
    if let Some(root) = &cli.root {
        config.paths.kata_root = root.clone();
    }
    if let Some(notes_root) = &cli.notes_root {
        config.paths.notes_root = notes_root.clone();
    }
    if let Some(provider) = &cli.provider {
        config.hints.provider = provider.clone();
    }
    if let Some(model) = &cli.model {
        config.hints.model = model.clone();
    }
    config.validate()?;
    Ok(config)
}

/// Watch mode owns the terminal, so its logs go to a file
fn init_tracing(command: &Commands, notes_root: &Path) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if matches!(command, Commands::Watch { .. }) {
        let file = fs::create_dir_all(notes_root).and_then(|_| {
            File::options()
                .create(true)
                .append(true)
                .open(notes_root.join(LOG_FILE))
        });
        if let Ok(file) = file {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .init();
        }
        return;
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_kata(config: &SenseiConfig, project: Option<&str>) -> Result<Kata> {
    let cwd = std::env::current_dir()?;
    Kata::resolve(&config.paths.kata_root, project, &cwd)
}

fn reasoning_service(config: &SenseiConfig, offline: bool) -> Arc<dyn ReasoningService> {
    if offline {
        return Arc::new(OfflineService);
    }
    create_service(&config.hints).unwrap_or_else(|e| {
        warn!(error = %e, "Reasoning service unavailable, using the fallback");
        Arc::new(OfflineService)
    })
}

async fn watch(config: &SenseiConfig, project: Option<&str>) -> Result<bool> {
    let kata = resolve_kata(config, project)?;
    let slug = kata.slug.clone();

    let summary = WatchSupervisor::new(kata, config.clone()).run().await?;

    println!(
        "{} {} after {}, {} run(s), last status: {}",
        "Session ended:".cyan().bold(),
        slug,
        format_elapsed(summary.elapsed),
        summary.runs,
        summary.last_status.label()
    );
    Ok(true)
}

async fn check(
    config: &SenseiConfig,
    project: Option<&str>,
    test: Option<&str>,
    preview: bool,
    offline: bool,
) -> Result<bool> {
    let kata = resolve_kata(config, project)?;
    let executor = TestExecutor::from_settings(&config.check, &kata.dir)?;
    let mode = if preview {
        RunMode::Preview(config.check.preview_timeout())
    } else {
        RunMode::Watch
    };

    println!("{} {}", "Running".dimmed(), executor.command_line(test));
    let outcome = RunOutcome::from_result(executor.run(test, mode), test);
    let seconds = outcome.result.duration.as_secs_f64();

    let Some(digest) = &outcome.digest else {
        println!("{} in {:.1}s", "✓ Passed".green().bold(), seconds);
        return Ok(true);
    };

    println!(
        "{} (exit {}) in {:.1}s",
        "✗ Failed".red().bold(),
        outcome.result.exit_code,
        seconds
    );
    if outcome.result.timed_out {
        println!("  {}", "Timed out".yellow());
    }
    println!("  {} {}", "Test:".bold(), digest.test_name);
    println!("  {} {}", "Where:".bold(), digest.location);
    if !digest.snippet.is_empty() {
        println!("  {} {}", "Why:".bold(), digest.snippet);
    }
    if let Some(target) = digest.rerun_target() {
        println!("  {} sensei check {} --test {}", "Rerun:".dimmed(), kata.slug, target);
    }

    if !offline {
        println!("\n{}", "Analyzing failure...".yellow());
        let advisor = HintAdvisor::new(reasoning_service(config, false));
        let diagnosis = advisor
            .diagnose(&kata.slug, &outcome.result.combined_output)
            .await;
        println!("{} {}", "Diagnosis:".yellow().bold(), diagnosis.text);
    }
    Ok(false)
}

async fn hint(
    config: &SenseiConfig,
    project: &str,
    question: Option<&str>,
    offline: bool,
    dry_run: bool,
) -> Result<bool> {
    let kata = Kata::resolve(&config.paths.kata_root, Some(project), &std::env::current_dir()?)?;
    let question = question.unwrap_or_default();
    let ctx = HintContext::for_kata(&kata.dir);
    let advisor = HintAdvisor::new(reasoning_service(config, offline || dry_run));

    if dry_run {
        let (system, user) = advisor.prompt_preview(question, &ctx);
        println!("{}\n{}\n", "System:".cyan().bold(), system);
        println!("{}\n{}", "User:".cyan().bold(), user);
        return Ok(true);
    }

    let limiter = RateLimiter::from_settings(&config.paths.notes_root, &config.hints);
    let decision = limiter.check(&kata.slug)?;
    if !decision.allowed {
        return Err(SenseiError::RateLimited {
            project: kata.slug,
            wait_secs: decision.wait_secs,
        });
    }

    let block = advisor.build_hint(question, &ctx).await;
    limiter.record(&kata.slug)?;
    println!("{}", block.to_text());
    println!(
        "\n{} {} hint(s) left today",
        "Quota:".dimmed(),
        limiter.remaining(&kata.slug)
    );
    Ok(true)
}

fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{}m {:02}s", secs / 60, secs % 60)
}
