use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use docmatch_core::{
    check_liveness, detect_faces, verify_pair, verify_single, FaceBox, Hints, OnnxAnalyzer, Outcome,
    PairOptions, SingleOptions, VerifyError,
};
use image::RgbImage;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "docmatch", version, about = "Document-vs-selfie face verification")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run passive liveness sanity checks on a selfie
    Liveness {
        image: PathBuf,
    },
    /// List detected faces
    Detect {
        image: PathBuf,
        #[arg(long, default_value_t = 0.6)]
        score_threshold: f32,
    },
    /// Compare the portrait on a document image with a selfie
    Verify {
        document: PathBuf,
        selfie: PathBuf,
        /// Similarity threshold (default from config)
        #[arg(long)]
        threshold: Option<f32>,
        /// Skip the liveness checks on the selfie
        #[arg(long)]
        no_liveness: bool,
    },
    /// Verify one photo of a person holding their ID card
    VerifySingle {
        image: PathBuf,
        /// Similarity threshold (default from config)
        #[arg(long)]
        threshold: Option<f32>,
        /// Live face box in image pixels, as x,y,w,h
        #[arg(long)]
        candidate_box: Option<FaceBox>,
        /// Card portrait box in image pixels, as x,y,w,h
        #[arg(long)]
        document_box: Option<FaceBox>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}

/// Execute one command. `Ok(false)` means the request itself failed and a
/// failure JSON was printed.
fn run(cli: Cli) -> Result<bool> {
    let config = Config::load(cli.config.as_deref())?;
    tracing::debug!(model_dir = %config.model_dir.display(), "configuration loaded");

    match cli.command {
        Commands::Liveness { image } => {
            let result = decode(&image).and_then(|img| {
                let mut analyzer = load_analyzer(&config)?;
                Ok(check_liveness(&mut analyzer, &img)?)
            });
            emit(result)
        }
        Commands::Detect { image, score_threshold } => {
            let result = decode(&image).and_then(|img| {
                let mut analyzer = load_analyzer(&config)?;
                Ok(detect_faces(&mut analyzer, &img, score_threshold)?)
            });
            emit(result)
        }
        Commands::Verify {
            document,
            selfie,
            threshold,
            no_liveness,
        } => {
            let options = PairOptions {
                threshold: threshold.unwrap_or(config.threshold),
                run_liveness: config.run_liveness && !no_liveness,
            };
            let result = decode(&document).and_then(|doc| {
                let selfie = decode(&selfie)?;
                let mut analyzer = load_analyzer(&config)?;
                Ok(verify_pair(&mut analyzer, doc, selfie, &options)?)
            });
            emit(result)
        }
        Commands::VerifySingle {
            image,
            threshold,
            candidate_box,
            document_box,
        } => {
            let options = SingleOptions {
                threshold: threshold.unwrap_or(config.threshold),
                pairing: config.pairing(),
                hints: Hints {
                    candidate: candidate_box,
                    document: document_box,
                },
            };
            let result = decode(&image).and_then(|img| {
                let mut analyzer = load_analyzer(&config)?;
                Ok(verify_single(&mut analyzer, img, &options)?)
            });
            emit(result)
        }
    }
}

/// Errors that end the command: request failures become failure JSON,
/// operational failures (missing models) abort.
enum CommandError {
    Request(VerifyError),
    Fatal(anyhow::Error),
}

impl From<VerifyError> for CommandError {
    fn from(e: VerifyError) -> Self {
        CommandError::Request(e)
    }
}

impl From<docmatch_core::AnalyzerError> for CommandError {
    fn from(e: docmatch_core::AnalyzerError) -> Self {
        CommandError::Request(e.into())
    }
}

impl From<anyhow::Error> for CommandError {
    fn from(e: anyhow::Error) -> Self {
        CommandError::Fatal(e)
    }
}

fn decode(path: &Path) -> Result<RgbImage, CommandError> {
    let img = image::open(path)
        .map_err(|e| VerifyError::Input(format!("cannot decode {}: {e}", path.display())))?;
    tracing::debug!(
        path = %path.display(),
        width = img.width(),
        height = img.height(),
        "image decoded"
    );
    Ok(img.to_rgb8())
}

fn load_analyzer(config: &Config) -> Result<OnnxAnalyzer> {
    OnnxAnalyzer::load(&config.scrfd_model_path(), &config.arcface_model_path(), config.detector())
        .with_context(|| format!("loading models from {}", config.model_dir.display()))
}

fn emit<T: Serialize>(result: Result<T, CommandError>) -> Result<bool> {
    let outcome = match result {
        Ok(value) => Outcome::Success(value),
        Err(CommandError::Request(e)) => {
            tracing::warn!(error = %e, "request failed");
            Outcome::from_result(Err(e))
        }
        Err(CommandError::Fatal(e)) => return Err(e),
    };
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(outcome.is_ok())
}
