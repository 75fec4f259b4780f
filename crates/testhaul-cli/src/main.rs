#![forbid(unsafe_code)]

use std::error::Error;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Instant;

use clap::{Parser, Subcommand};

use testhaul_config::settings::{Profile, Settings, SETTINGS_FILE};
use testhaul_config::BuildContext;
use testhaul_engine::stages::CLEAN_ARTIFACTS;
use testhaul_engine::{Pipeline, StageOutcome};
use testhaul_report::ReportSummary;

type CliResult = Result<(), Box<dyn Error>>;

#[derive(Debug, Parser)]
#[command(name = "testhaul", about = "Aggregate, archive and publish JUnit test reports")]
#[command(version)]
struct Cli {
    /// Workspace root (defaults to the current directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,
    /// Settings file (defaults to testhaul.toml in the workspace root)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Show debug output
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a stage and everything it depends on
    Run {
        /// Stage to run (defaults to publish-final on a build server, else extract-failed-list)
        stage: Option<String>,
    },
    /// Print the execution order of a stage without running anything
    Plan {
        /// Stage to plan (same default as `run`)
        stage: Option<String>,
    },
    /// List the registered stages
    List,
    /// Print the counts and test names of a rendered report
    Summary {
        /// Path to the report's index.html
        report: PathBuf,
    },
    /// Delete the archive, metadata and failure listing
    Clean,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let workspace = Workspace {
        root: cli.root,
        config: cli.config,
    };
    let result = match cli.command {
        Command::Run { stage } => cmd_run(&workspace, stage),
        Command::Plan { stage } => cmd_plan(&workspace, stage),
        Command::List => cmd_list(&workspace),
        Command::Summary { report } => cmd_summary(&report),
        Command::Clean => cmd_clean(&workspace),
    };

    if let Err(msg) = result {
        eprintln!("error: {msg}");
        process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

/// The global `--root` and `--config` options.
#[derive(Debug, Default)]
struct Workspace {
    root: Option<PathBuf>,
    config: Option<PathBuf>,
}

impl Workspace {
    fn root(&self) -> Result<PathBuf, Box<dyn Error>> {
        let root = match &self.root {
            Some(root) => root.clone(),
            None => std::env::current_dir()?,
        };
        if !root.is_dir() {
            return Err(format!("workspace root {} is not a directory", root.display()).into());
        }
        Ok(root)
    }

    /// Settings resolved for `profile`. An explicit `--config` file must exist.
    fn settings(&self, root: &Path, profile: Profile) -> Result<Settings, Box<dyn Error>> {
        let settings = match &self.config {
            Some(path) => Settings::from_path(path)?,
            None => Settings::from_path_or_default(&root.join(SETTINGS_FILE))?,
        };
        Ok(settings.resolve(profile))
    }

    fn pipeline(&self) -> Result<Pipeline, Box<dyn Error>> {
        let root = self.root()?;
        let ctx = BuildContext::from_env()?;
        log::debug!(
            "workspace {} (build server: {})",
            root.display(),
            ctx.build_server.as_deref().unwrap_or("none")
        );
        let settings = self.settings(&root, ctx.profile())?;
        Ok(testhaul_engine::assemble_pipeline(&root, &settings, &ctx)?)
    }
}

fn cmd_run(workspace: &Workspace, stage: Option<String>) -> CliResult {
    let start = Instant::now();
    let mut pipeline = workspace.pipeline()?;
    let target = stage.unwrap_or_else(|| testhaul_engine::default_target(&pipeline).to_owned());

    let report = pipeline.run(&target)?;

    eprintln!(
        "    Finished `{target}` in {:.2}s ({} executed, {} skipped)",
        start.elapsed().as_secs_f64(),
        report.count(StageOutcome::Executed),
        report.count(StageOutcome::Skipped),
    );
    Ok(())
}

fn cmd_plan(workspace: &Workspace, stage: Option<String>) -> CliResult {
    let pipeline = workspace.pipeline()?;
    let target = stage.unwrap_or_else(|| testhaul_engine::default_target(&pipeline).to_owned());

    for (index, name) in pipeline.plan(&target)?.iter().enumerate() {
        let conditional = pipeline.get(name).is_some_and(testhaul_engine::Stage::is_guarded);
        let suffix = if conditional { " (conditional)" } else { "" };
        println!("{:>3}. {name}{suffix}", index.saturating_add(1));
    }
    Ok(())
}

fn cmd_list(workspace: &Workspace) -> CliResult {
    let pipeline = workspace.pipeline()?;
    for stage in pipeline.stages() {
        println!("{:<32} {}", stage.name(), stage.description());
        if !stage.dependencies().is_empty() {
            let deps: Vec<&str> = stage.dependencies().iter().map(String::as_str).collect();
            println!("{:<32}   depends on: {}", "", deps.join(", "));
        }
    }
    Ok(())
}

fn cmd_summary(report: &Path) -> CliResult {
    let summary = ReportSummary::from_path(report)?;

    println!("failures: {}", summary.failures());
    for name in summary.failed_tests() {
        println!("  - {name}");
    }
    println!("ignored: {}", summary.ignored());
    for name in summary.ignored_tests() {
        println!("  - {name}");
    }
    Ok(())
}

fn cmd_clean(workspace: &Workspace) -> CliResult {
    let mut pipeline = workspace.pipeline()?;
    pipeline.run(CLEAN_ARTIFACTS)?;

    eprintln!("    Cleaned test report artifacts");
    Ok(())
}
