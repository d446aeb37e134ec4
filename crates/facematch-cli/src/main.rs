use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facematch_core::{
    discover_images, BatchEvaluator, Catalog, CatalogMatcher, ImageRef, ModelId, SearchOutcome,
    TracingObserver,
};
use facematch_deepface::{DeepFaceClient, DeepFaceConfig};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "facematch", version, about = "Face verification and catalog lookup")]
struct Cli {
    /// DeepFace REST server root
    #[arg(
        long,
        env = "FACEMATCH_DEEPFACE_URL",
        default_value = "http://127.0.0.1:5005",
        global = true
    )]
    deepface_url: String,

    /// Timeout for one comparison, in seconds
    #[arg(long, default_value_t = 120, global = true)]
    timeout_secs: u64,

    /// Face detector the server should use (e.g. "opencv", "retinaface")
    #[arg(long, global = true)]
    detector_backend: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether two pictures show the same person
    Verify {
        query: String,
        candidate: String,
        #[arg(short, long, default_value_t = ModelId::default())]
        model: ModelId,
    },
    /// Search the catalog for the first picture of the same person
    Find {
        query: String,
        /// Catalog file holding {"images": [...]}
        #[arg(short, long, default_value = "files.json")]
        catalog: PathBuf,
        #[arg(short, long, default_value_t = ModelId::default())]
        model: ModelId,
    },
    /// List the catalog entries
    Images {
        #[arg(short, long, default_value = "files.json")]
        catalog: PathBuf,
    },
    /// Compare every test image with every reference image
    Evaluate {
        #[arg(long, default_value = "testing")]
        testing: PathBuf,
        #[arg(long, default_value = "faces")]
        faces: PathBuf,
        /// Models to evaluate (repeatable); all models when omitted
        #[arg(short, long)]
        model: Vec<ModelId>,
        /// Write one JSON record per line here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List supported models
    Models,
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let deepface = DeepFaceConfig {
        base_url: cli.deepface_url.clone(),
        timeout: Duration::from_secs(cli.timeout_secs),
        detector_backend: cli.detector_backend.clone(),
        ..DeepFaceConfig::default()
    };

    match cli.command {
        Commands::Verify {
            query,
            candidate,
            model,
        } => {
            let client = DeepFaceClient::new(deepface)?;
            let observer = TracingObserver::current();
            let result = CatalogMatcher::new(&client, &observer)
                .verify(&query.into(), &candidate.into(), model)
                .context("comparison failed")?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Find {
            query,
            catalog,
            model,
        } => {
            let catalog = Catalog::load(&catalog)?;
            tracing::info!(entries = catalog.len(), model = %model, "searching catalog");
            let client = DeepFaceClient::new(deepface)?;
            let observer = TracingObserver::current();
            let report = CatalogMatcher::new(&client, &observer).search(
                &ImageRef::from(query),
                &catalog,
                model,
            );
            for skipped in &report.skipped {
                tracing::warn!(candidate = %skipped.candidate, error = %skipped.error, "skipped");
            }
            match &report.outcome {
                SearchOutcome::Found(image) => println!("Person Found {image}"),
                SearchOutcome::NotFound => println!("Processed all URLs, person not found"),
            }
        }
        Commands::Images { catalog } => {
            let catalog = Catalog::load(&catalog)?;
            for image in &catalog {
                println!("{image}");
            }
        }
        Commands::Evaluate {
            testing,
            faces,
            model,
            output,
        } => {
            let models = if model.is_empty() {
                ModelId::ALL.to_vec()
            } else {
                model
            };
            let test_images = discover_images(&testing)?;
            let db_images = discover_images(&faces)?;
            tracing::info!(
                models = models.len(),
                test_images = test_images.len(),
                db_images = db_images.len(),
                "batch evaluation started"
            );

            let client = DeepFaceClient::new(deepface)?;
            let observer = TracingObserver::current();
            let records =
                BatchEvaluator::new(&client, &observer).evaluate(&test_images, &db_images, &models);

            let mut out: Box<dyn Write> = match &output {
                Some(path) => Box::new(BufWriter::new(
                    File::create(path).with_context(|| format!("creating {}", path.display()))?,
                )),
                None => Box::new(std::io::stdout().lock()),
            };
            for record in &records {
                serde_json::to_writer(&mut out, record)?;
                writeln!(out)?;
            }
            out.flush()?;

            let failures = records.iter().filter(|r| r.is_failure()).count();
            tracing::info!(records = records.len(), failures, "batch evaluation finished");
        }
        Commands::Models => {
            for model in ModelId::ALL {
                println!("{model}");
            }
        }
    }

    Ok(())
}
