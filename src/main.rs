use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use spark_notify::{
    BuildResult, Config, ConsoleLog, Environment, InvocationReport, MessageFormat, ResultGate,
    Runner, SparkClient,
};

const CONFIG_FILE: &str = "spark-notify.toml";

#[derive(Parser)]
#[command(name = "spark-notify")]
#[command(about = "Post build status messages to Spark spaces")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file (default: spark-notify.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Message template, overrides the one in the config file
    #[arg(short, long, global = true)]
    message: Option<String>,

    /// Build variable as KEY=VALUE, layered over the process environment
    #[arg(short = 'e', long = "env", global = true, value_parser = parse_env_var)]
    env: Vec<(String, String)>,

    /// Send the message without interpolating any variables
    #[arg(long, global = true, conflicts_with = "env")]
    no_env: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Notify from a build step
    Build,

    /// Notify once the build has finished
    PostBuild {
        /// Build result: SUCCESS, FAILURE, ABORTED or UNSTABLE
        #[arg(short, long)]
        result: Option<BuildResult>,
    },

    /// Notify from a pipeline step
    Pipeline {
        /// Fail the step on the first notification error
        #[arg(long)]
        fail_on_error: bool,
    },

    /// Validate the config file and list the configured spaces
    Check,
}

/// Host hook a notification runs from
enum Hook {
    Build,
    PostBuild(Option<BuildResult>),
    Pipeline { fail_on_error: bool },
}

fn main() {
    init_tracing();

    if let Err(e) = run() {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.unwrap_or_else(|| PathBuf::from(CONFIG_FILE));

    let mut config = Config::load(&config_path)
        .with_context(|| format!("Could not load {}", config_path.display()))?;

    if let Some(message) = cli.message {
        config.notify.message = message;
    }

    let env = if cli.no_env {
        None
    } else {
        Some(build_environment(cli.env))
    };

    match cli.command {
        Commands::Build => cmd_notify(&config, Hook::Build, env.as_ref()),
        Commands::PostBuild { result } => cmd_notify(&config, Hook::PostBuild(result), env.as_ref()),
        Commands::Pipeline { fail_on_error } => cmd_notify(
            &config,
            Hook::Pipeline {
                fail_on_error: fail_on_error || config.fail_on_error,
            },
            env.as_ref(),
        ),
        Commands::Check => cmd_check(&config, &config_path),
    }
}

fn parse_env_var(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))?;

    if key.is_empty() {
        return Err(format!("missing variable name in '{}'", s));
    }

    Ok((key.to_string(), value.to_string()))
}

fn build_environment(overrides: Vec<(String, String)>) -> Environment {
    let mut env: Environment = std::env::vars().collect();
    env.extend(overrides);
    env
}

#[tokio::main]
async fn cmd_notify(config: &Config, hook: Hook, env: Option<&Environment>) -> Result<()> {
    let client = SparkClient::new(config.api.endpoint.as_str(), config.api.timeout())
        .context("Failed to build HTTP client")?;
    let store = config.credential_store();
    let runner = Runner::new(&client, store.as_ref());
    let mut log = ConsoleLog;

    let report = match hook {
        Hook::Build => runner.build_step(&config.notify, env, &mut log).await,
        Hook::PostBuild(result) => {
            let gate = ResultGate::new(result, config.skip);
            runner.post_build(&config.notify, gate, env, &mut log).await
        }
        Hook::Pipeline { fail_on_error } => {
            runner
                .pipeline_step(&config.notify, fail_on_error, env, &mut log)
                .await?
        }
    };

    print_summary(&report);

    Ok(())
}

fn print_summary(report: &InvocationReport) {
    if report.outcomes.is_empty() {
        return;
    }

    println!("{}", "─".repeat(50).dimmed());

    if report.failed() == 0 {
        println!(
            "{} Message sent to {} space(s)",
            "✓".green().bold(),
            report.sent()
        );
    } else {
        println!(
            "{} {}/{} space(s) not notified",
            "!".yellow().bold(),
            report.failed(),
            report.outcomes.len()
        );

        for outcome in report.outcomes.iter().filter(|o| !o.outcome.is_success()) {
            println!("  {} {}", "•".red(), outcome.target_id);
        }
    }
}

fn cmd_check(config: &Config, config_path: &std::path::Path) -> Result<()> {
    println!("\n{} {}\n", "📨".cyan(), config_path.display().to_string().bold());

    let format = config.notify.format.unwrap_or_default();
    let formats: Vec<_> = MessageFormat::ALL.iter().map(|f| f.as_str()).collect();
    println!(
        "  {} {} {}",
        "format:".dimmed(),
        format,
        format!("({})", formats.join(", ")).dimmed()
    );

    if let Some(ref id) = config.notify.credentials_id {
        println!("  {} {}", "credentials:".dimmed(), id);
    }

    if config.notify.disable {
        println!("  {} {}", "disabled:".dimmed(), "true".yellow());
    }

    if config.fail_on_error {
        println!("  {} {}", "fail_on_error:".dimmed(), "true".yellow());
    }

    if !config.notify.targets.is_empty() {
        println!("\n{}", "Spaces:".bold());
        for target in &config.notify.targets {
            match target.name {
                Some(ref name) => println!("  {} {} {}", "•".green(), name, target.id.cyan()),
                None => println!("  {} {}", "•".green(), target.id.cyan()),
            }
        }
    }

    let problems = config.problems();
    if problems.is_empty() {
        println!("\n{} Configuration looks good", "✓".green().bold());
        return Ok(());
    }

    println!("\n{}", "Problems:".red().bold());
    for problem in &problems {
        println!("  {} {}", "•".red(), problem);
    }

    anyhow::bail!("{} problem(s) found in {}", problems.len(), config_path.display())
}
