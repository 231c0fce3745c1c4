use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use log::{error, info};

use jobcard::batch::{parse_jobs, BatchRenderer};
use jobcard::{CreativeConfig, RenderConfig, RenderPipeline, RenderResult, ServerConfig};

/// Render job listings into PNG job cards
#[derive(Parser, Debug)]
#[command(name = "jobcard", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    render: RenderArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render every job in a jobs file to PNG
    #[command(
        after_help = "Example:\n  jobcard render --jobs ./data/jobs.json --creative ./creative/theme.json --template ./templates/job-card.html"
    )]
    Render(BatchArgs),
    /// Run the HTTP render service
    Serve(ServeArgs),
}

#[derive(Args, Debug)]
struct BatchArgs {
    /// Path to jobs JSON file (array or single object)
    #[arg(short, long)]
    jobs: PathBuf,
    /// Path to creative config JSON file
    #[arg(short, long)]
    creative: PathBuf,
    /// Path to HTML template file
    #[arg(short, long)]
    template: PathBuf,
    /// Output directory for PNG files
    #[arg(short, long, default_value = "./output")]
    out: PathBuf,
}

#[derive(Args, Debug)]
struct ServeArgs {
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    port: u16,
    /// Directory of HTML templates
    #[arg(long, env = "JOBCARD_TEMPLATES", default_value = "./templates")]
    templates: PathBuf,
    /// Maximum request body in bytes
    #[arg(long, default_value_t = 10 * 1024 * 1024)]
    body_limit: usize,
}

/// Rasterizer settings shared by both modes
#[derive(Args, Debug)]
struct RenderArgs {
    /// Chrome/Chromium executable (auto-detected if omitted)
    #[arg(long, global = true, env = "JOBCARD_CHROME")]
    chrome: Option<PathBuf>,
    /// Keep the Chrome sandbox enabled
    #[arg(long, global = true)]
    sandbox: bool,
    /// Per-render timeout in milliseconds
    #[arg(long, global = true, env = "JOBCARD_RENDER_TIMEOUT_MS", default_value_t = 30_000)]
    render_timeout_ms: u64,
    /// How long to wait for web fonts before capturing anyway
    #[arg(long, global = true, default_value_t = 5_000)]
    font_timeout_ms: u64,
}

impl From<&RenderArgs> for RenderConfig {
    fn from(args: &RenderArgs) -> Self {
        RenderConfig {
            chrome_path: args.chrome.clone(),
            sandbox: args.sandbox,
            render_timeout_ms: args.render_timeout_ms,
            font_timeout_ms: args.font_timeout_ms,
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = RenderConfig::from(&cli.render);

    let outcome = match cli.command {
        Command::Render(args) => run_batch(args, config).await,
        Command::Serve(args) => run_server(args, config).await.map(|_| true),
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn read_json_file(path: &Path, what: &str) -> anyhow::Result<String> {
    if !path.exists() {
        bail!("{} file not found: {}", what, path.display());
    }
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

/// Returns whether every job rendered.
async fn run_batch(args: BatchArgs, config: RenderConfig) -> anyhow::Result<bool> {
    info!("Loading configuration files...");
    let jobs = parse_jobs(&read_json_file(&args.jobs, "Jobs")?)
        .with_context(|| format!("parsing {}", args.jobs.display()))?;
    let creative: CreativeConfig = serde_json::from_str(&read_json_file(&args.creative, "Creative config")?)
        .with_context(|| format!("parsing {}", args.creative.display()))?;
    if !args.template.exists() {
        bail!("Template file not found: {}", args.template.display());
    }

    if jobs.is_empty() {
        bail!("No jobs found in input file");
    }
    info!("Found {} job(s) to process", jobs.len());

    config.validate()?;
    let pipeline = RenderPipeline::new(jobcard::default_backend(config));
    let renderer = BatchRenderer::new(&pipeline, &args.out);

    let results = renderer.render_jobs(&jobs, &creative, &args.template).await;
    if let Err(e) = pipeline.shutdown().await {
        error!("Failed to close browser: {}", e);
    }
    let results = results?;

    print_summary(&results, renderer.out_dir());
    Ok(results.all_succeeded())
}

fn print_summary(results: &RenderResult, out_dir: &Path) {
    let rule = "=".repeat(50);
    println!("\n{}", rule);
    println!("BATCH RENDER COMPLETE");
    println!("{}", rule);
    println!("Total jobs: {}", results.total);
    println!("Success: {}", results.success);
    println!("Failed: {}", results.failed);

    if !results.errors.is_empty() {
        println!("\nErrors:");
        for err in &results.errors {
            println!("  - {}: {}", err.job, err.error);
        }
    }

    let shown = out_dir.canonicalize().unwrap_or_else(|_| out_dir.to_path_buf());
    println!("\nOutput saved to: {}", shown.display());
}

async fn run_server(args: ServeArgs, config: RenderConfig) -> anyhow::Result<()> {
    config.validate()?;
    let server = ServerConfig {
        host: args.host,
        port: args.port,
        templates_dir: args.templates,
        body_limit: args.body_limit,
    };
    let pipeline = Arc::new(RenderPipeline::new(jobcard::default_backend(config)));
    jobcard::server::serve(server, pipeline).await?;
    Ok(())
}
