use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Result, bail};
use clap::{ArgAction, Parser, Subcommand};
use glimpse_client::{ClientConfig, VisionClient};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::analyze::{FrameAnalyzer, analyze_image};
use crate::frames::{SamplingPlan, open_video, parse_timecode};
use crate::prompt;
use crate::report::{default_output_path, write_json};
use crate::settings::Settings;

const RULE: &str = "======================================================================";

#[derive(Parser)]
#[command(
    name = "glimpse",
    version,
    about = "Describe images and video frames with a local vision-language model"
)]
pub struct Cli {
    /// Settings file (TOML, or JSON when it ends in .json)
    #[arg(long, global = true, env = "GLIMPSE_CONFIG")]
    pub config: Option<PathBuf>,
    /// Model server base URL
    #[arg(long, global = true)]
    pub base_url: Option<String>,
    /// Model identifier (overrides the settings file)
    #[arg(long, global = true)]
    pub model: Option<String>,
    /// More logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyse a single image
    Image {
        path: PathBuf,
        /// Output JSON path (default: <results_dir>/<name>_analysis.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Upper bound on generated tokens
        #[arg(long, default_value_t = prompt::IMAGE_MAX_OUTPUT_TOKENS)]
        max_tokens: u32,
        /// Replace the built-in prompt
        #[arg(long)]
        prompt: Option<String>,
    },
    /// Analyse sampled frames of a video
    Video {
        path: PathBuf,
        /// Start time (mm:ss)
        #[arg(long, default_value = "0:00", value_parser = parse_timecode)]
        start: u64,
        /// End time (mm:ss)
        #[arg(long, value_parser = parse_timecode)]
        end: Option<u64>,
        /// Analyse every Nth frame
        #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u32).range(1..))]
        interval: u32,
        /// Output JSON path (default: <results_dir>/<name>_analysis.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Upper bound on generated tokens per frame (default: from settings)
        #[arg(long)]
        max_tokens: Option<u32>,
        /// Replace the built-in prompt
        #[arg(long)]
        prompt: Option<String>,
    },
    /// Check whether the model server is reachable
    Probe,
}

/// Install the log subscriber. `RUST_LOG` wins over `-v`.
pub fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Resolve the client configuration from settings and flags.
#[must_use]
pub fn client_config(cli: &Cli, settings: &Settings) -> ClientConfig {
    let mut config = settings.client_config();
    if let Some(model) = &cli.model {
        config.model.clone_from(model);
    }
    if let Some(base_url) = &cli.base_url {
        config.base_url.clone_from(base_url);
    }
    config
}

/// Run one command to completion.
///
/// # Errors
/// Returns an error for unusable input (missing file, undecodable video,
/// unwritable output). Model failures are reported through the exit code.
pub async fn execute(cli: Cli) -> Result<ExitCode> {
    let settings = Settings::load(cli.config.as_deref());
    let client = VisionClient::new(client_config(&cli, &settings));

    match cli.command {
        Commands::Image {
            path,
            output,
            max_tokens,
            prompt,
        } => {
            let output = output.unwrap_or_else(|| default_output_path(&settings.output.results_dir, &path));
            let prompt = prompt.as_deref().unwrap_or(prompt::IMAGE_ANALYSIS);
            run_image(&client, &path, &output, prompt, max_tokens).await
        }
        Commands::Video {
            path,
            start,
            end,
            interval,
            output,
            max_tokens,
            prompt,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let plan = SamplingPlan::every(interval).between(start as f64, end.map(|e| e as f64));
            let output = output.unwrap_or_else(|| default_output_path(&settings.output.results_dir, &path));
            let analyzer = FrameAnalyzer::new(
                &client,
                prompt.as_deref().unwrap_or(prompt::FRAME_ANALYSIS),
                max_tokens.unwrap_or(settings.model.parameters.max_new_tokens),
            );
            run_video(&client, &analyzer, &path, &output, &plan).await
        }
        Commands::Probe => {
            let available = client.http_available().await;
            println!("Model: {}", client.model());
            println!("Server: {}", client.config().base());
            println!("HTTP available: {available}");
            println!("Transport order: {}", client.chain().join(" -> "));
            Ok(if available {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

async fn run_image(
    client: &VisionClient,
    path: &std::path::Path,
    output: &std::path::Path,
    prompt: &str,
    max_tokens: u32,
) -> Result<ExitCode> {
    if !path.exists() {
        bail!("image not found: {}", path.display());
    }
    println!("Analyzing: {}", path.display());
    println!("Using model: {}", client.model());
    println!("HTTP available: {}", client.http_available().await);
    println!();

    let record = match analyze_image(client, path, prompt, max_tokens).await {
        Ok(record) => record,
        Err(e) => {
            error!("{e:#}");
            eprintln!("Analysis failed. Check that the model server is running and the model is loaded.");
            return Ok(ExitCode::FAILURE);
        }
    };

    println!("{RULE}\nANALYSIS RESULT\n{RULE}");
    println!("{}", record.analysis);
    println!("{RULE}");

    write_json(output, &record)?;
    println!("Results saved to: {}", output.display());
    Ok(ExitCode::SUCCESS)
}

async fn run_video(
    client: &VisionClient,
    analyzer: &FrameAnalyzer<'_>,
    path: &std::path::Path,
    output: &std::path::Path,
    plan: &SamplingPlan,
) -> Result<ExitCode> {
    if !path.exists() {
        bail!("video not found: {}", path.display());
    }
    println!("Video: {}", path.display());
    println!("Model: {}", client.model());
    println!("Start: {}s", plan.start_secs);
    if let Some(end) = plan.end_secs {
        println!("End: {end}s (duration {}s)", end - plan.start_secs);
    }
    println!("Frame interval: every {} frames", plan.interval);
    println!();

    info!("extracting frames");
    let frames = open_video(path)?.sample(plan)?;
    info!(count = frames.len(), "frames extracted");
    if frames.is_empty() {
        warn!("no frames selected; nothing to analyse");
        return Ok(ExitCode::FAILURE);
    }

    let progress = ProgressBar::new(frames.len() as u64);
    if let Ok(style) = ProgressStyle::with_template("{bar:40} {pos}/{len} frames [{elapsed_precise}<{eta_precise}]") {
        progress.set_style(style);
    }
    let records = analyzer.analyze(frames, &progress).await;

    println!("{RULE}\nVIDEO ANALYSIS RESULTS\n{RULE}");
    for record in &records {
        println!("\n--- Frame {} (Time: {}s) ---", record.frame_number, record.timestamp);
        match (&record.analysis, &record.error) {
            (Some(text), _) => println!("{text}"),
            (None, Some(err)) => println!("<failed> {err}"),
            (None, None) => println!("No analysis available"),
        }
    }

    write_json(output, &records)?;
    println!("\nResults saved to: {}", output.display());

    let succeeded = records.iter().filter(|r| r.succeeded()).count();
    println!("Processed {} frames ({succeeded} analysed).", records.len());
    Ok(if succeeded == 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
