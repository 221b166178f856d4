use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use shortgen::{CaptureStrategy, ChromeLauncher, PipelineConfig};

#[derive(Parser, Debug)]
#[command(name = "shortgen", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate one or more videos (requires a browser and `ffmpeg` on PATH).
    Generate(GenerateArgs),
}

#[derive(Parser, Debug)]
struct GenerateArgs {
    /// Pipeline configuration JSON; flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// HTML template with `{numero1}..{numeroN}` placeholders.
    #[arg(long)]
    template: Option<PathBuf>,

    /// Output directory for finished videos.
    #[arg(long = "out-dir")]
    out_dir: Option<PathBuf>,

    /// Number of jobs to run sequentially.
    #[arg(long, default_value_t = 1)]
    jobs: u64,

    /// Identifier of the first job.
    #[arg(long = "start-id", default_value_t = 1)]
    start_id: u64,

    /// Capture duration in seconds.
    #[arg(long)]
    duration: Option<u64>,

    /// Capture strategy.
    #[arg(long, value_enum)]
    strategy: Option<StrategyChoice>,

    /// Window-title token for window capture.
    #[arg(long = "title-token")]
    title_token: Option<String>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StrategyChoice {
    Region,
    Window,
}

impl From<StrategyChoice> for CaptureStrategy {
    fn from(choice: StrategyChoice) -> Self {
        match choice {
            StrategyChoice::Region => CaptureStrategy::Region,
            StrategyChoice::Window => CaptureStrategy::Window,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Generate(args) => cmd_generate(args),
    }
}

fn cmd_generate(args: GenerateArgs) -> anyhow::Result<()> {
    let mut cfg = match &args.config {
        Some(path) => PipelineConfig::from_path(path)
            .with_context(|| format!("load config '{}'", path.display()))?,
        None => PipelineConfig::default(),
    };

    if let Some(template) = args.template {
        cfg.template = template;
    }
    if let Some(out_dir) = args.out_dir {
        cfg.output_dir = out_dir;
    }
    if let Some(duration) = args.duration {
        cfg.duration_secs = duration;
    }
    if let Some(strategy) = args.strategy {
        cfg.strategy = strategy.into();
    }
    if let Some(token) = args.title_token {
        cfg.title_token = Some(token);
    }
    cfg.validate().context("invalid pipeline configuration")?;

    if args.jobs == 0 {
        anyhow::bail!("--jobs must be at least 1");
    }

    let launcher = ChromeLauncher::new(cfg.browser.clone());
    let mut failed = 0u64;
    for id in args.start_id..args.start_id + args.jobs {
        let job = cfg.job(id);
        match shortgen::run_job(&job, &launcher) {
            Ok(path) => {
                tracing::info!(job = id, artifact = %path.display(), "video saved");
            }
            Err(e) => {
                failed += 1;
                tracing::error!(job = id, stage = e.stage(), error = %e, "job failed");
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} jobs failed", args.jobs);
    }
    Ok(())
}
