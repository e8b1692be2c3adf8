use std::path::PathBuf;

use anyhow::{Context, bail};
use chrono::Local;
use clap::{Parser, Subcommand};
use tokio::task::JoinSet;

use spam_classifier::config::validate_test_size;
use spam_classifier::mailbox;
use spam_classifier::{Config, ModelConfig, PredictionPipeline, TrainingPipeline, logging};

const PREVIEW_CHARS: usize = 200;

#[derive(Parser, Debug)]
#[command(version, about = "Train and run the spam/ham email classifier")]
struct Cli {
    /// Override the output directory for runs and predictions.
    #[arg(long, global = true, env = "SPAM_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Explicit model file (defaults to the latest run).
    #[arg(long, global = true)]
    model: Option<PathBuf>,

    /// Explicit vectorizer file (defaults to the latest run).
    #[arg(long, global = true)]
    vectorizer: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train every model family and persist the best one.
    Train {
        /// Labeled CSV with Category and Message columns.
        #[arg(long)]
        data: Option<PathBuf>,
        #[arg(long)]
        folds: Option<usize>,
        #[arg(long)]
        test_size: Option<f64>,
        /// Restrict training to these families (e.g. SVM,KNN).
        #[arg(long, value_delimiter = ',')]
        models: Vec<String>,
    },
    /// Classify one email body.
    Predict {
        text: Option<String>,
        /// Read the body from a file instead.
        #[arg(long, conflicts_with = "text")]
        file: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Classify every message of one or more mbox archives
    /// (defaults to SPAM_MAILBOX_PATH).
    PredictMbox {
        paths: Vec<PathBuf>,
        /// CSV destination (single mailbox only).
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Export an mbox archive to CSV without predicting.
    ExtractMbox {
        path: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::from_env().context("invalid configuration")?;
    if let Some(dir) = cli.output_dir {
        config.output_base_dir = dir;
    }
    if cli.model.is_some() {
        config.model_path = cli.model;
    }
    if cli.vectorizer.is_some() {
        config.vectorizer_path = cli.vectorizer;
    }

    let _guard = logging::init(&config.log_dir).context("failed to initialise logging")?;

    match cli.command {
        Command::Train {
            data,
            folds,
            test_size,
            models,
        } => {
            if let Some(data) = data {
                config.training_data_path = data;
            }
            if let Some(test_size) = test_size {
                validate_test_size(test_size)?;
                config.test_size = test_size;
            }
            let folds = folds.unwrap_or(config.cv_folds);
            if folds < 2 {
                bail!("--folds must be at least 2, got {folds}");
            }
            let model_config = if models.is_empty() {
                ModelConfig::default()
            } else {
                ModelConfig::default().restrict_to(&models)?
            };

            let state = tokio::task::spawn_blocking(move || {
                TrainingPipeline::with_models(&config, model_config).run_pipeline(folds)
            })
            .await??;

            let outcome = state.outcome("cli")?;
            let best = outcome.best();
            println!("Best model: {}", best.kind);
            println!("  Accuracy:  {:.4}", best.scores.accuracy);
            println!("  Precision: {:.4}", best.scores.precision);
            println!("  Recall:    {:.4}", best.scores.recall);
            println!("  F1-Score:  {:.4}", best.scores.f1_score);
            println!("Artifacts saved to {}", outcome.run.root.display());
        }
        Command::Predict { text, file, json } => {
            let body = match (text, file) {
                (Some(text), _) => text,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read {}", path.display()))?,
                (None, None) => bail!("provide email text or --file"),
            };
            let mut pipeline = PredictionPipeline::new(&config);
            let (body, result) = tokio::task::spawn_blocking(move || {
                let result = pipeline.predict_single_email(&body);
                (body, result)
            })
            .await?;
            let result = result?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Prediction: {}", result.prediction);
                match result.confidence {
                    Some(confidence) => println!("Confidence: {confidence:.2}%"),
                    None => println!("Confidence: n/a"),
                }
                println!("Preview:    {}", preview(&body));
            }
        }
        Command::PredictMbox { paths, output } => {
            let paths = config.mailbox_paths(paths);
            if output.is_some() && paths.len() > 1 {
                bail!("--output can only be used with a single mailbox");
            }
            let mut pipeline = PredictionPipeline::new(&config);
            pipeline.load_models()?;

            let stamp = Local::now().format("%Y%m%d_%H%M%S");
            let mut tasks = JoinSet::new();
            for (i, path) in paths.into_iter().enumerate() {
                let mut pipeline = pipeline.clone();
                let output = output.clone().unwrap_or_else(|| {
                    let suffix = if i == 0 { String::new() } else { format!("_{i}") };
                    config
                        .output_base_dir
                        .join(format!("predictions_{stamp}{suffix}.csv"))
                });
                tasks.spawn_blocking(move || {
                    let result = pipeline.predict_mbox_file(&path, Some(output.as_path()));
                    (path, output, result)
                });
            }

            while let Some(joined) = tasks.join_next().await {
                let (path, output, result) = joined?;
                let predictions = result?;
                println!("{}", path.display());
                println!("  Total emails: {}", predictions.summary.total_emails);
                for (label, count) in &predictions.summary.counts {
                    println!("  {label}: {count}");
                }
                println!("  Saved to {}", output.display());
            }
        }
        Command::ExtractMbox { path, output } => {
            let records = tokio::task::spawn_blocking(move || mailbox::load_mailbox(&path)).await??;
            mailbox::write_records_csv(&records, &output, false)?;
            println!("Extracted {} emails to {}", records.len(), output.display());
        }
    }

    Ok(())
}

fn preview(body: &str) -> String {
    let mut chars = body.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
