use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use facesort_core::extractor::{list_images, FaceExtractor};
use facesort_core::sorter::SortPlan;
use facesort_core::training::collect_training_set;
use facesort_core::{
    identify_image, CentroidModel, Identifier, ImageOutcome, ImageReport, ManifestExtractor,
    NameMap, TrainedModel,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "facesort", about = "Identify, sort and crop photos by person")]
struct Cli {
    /// TOML config file (default: $FACESORT_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Trained model file
    #[arg(long, global = true)]
    model: Option<PathBuf>,
    /// JSON map from trained IDs to display names
    #[arg(long, global = true)]
    names: Option<PathBuf>,
    /// Confidence threshold in [0, 1]
    #[arg(long, global = true)]
    threshold: Option<f32>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a model from <train-dir>/<person>/<image> folders
    Train {
        /// Embedding manifest covering the training images
        #[arg(short, long)]
        manifest: PathBuf,
        #[arg(long)]
        train_dir: PathBuf,
        /// Where to write the model (default: configured model path)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Identify the faces in the given images
    Identify {
        #[arg(short, long)]
        manifest: PathBuf,
        /// Print reports as JSON
        #[arg(long)]
        json: bool,
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
    /// Copy every image in a folder into one folder per identified person
    Sort {
        #[arg(short, long)]
        manifest: PathBuf,
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Save padded crops of every detected face (training set preparation)
    Crop {
        #[arg(short, long)]
        manifest: PathBuf,
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long)]
        padding: Option<u32>,
        /// Clear the output folder if it already exists
        #[arg(long)]
        force: bool,
    },
    /// Show the trained model's classes
    Info,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(model) = cli.model {
        config.model_path = model;
    }
    if let Some(names) = cli.names {
        config.name_map_path = Some(names);
    }
    if let Some(threshold) = cli.threshold {
        config.threshold = threshold;
    }
    config.validate()?;

    match cli.command {
        Commands::Train { manifest, train_dir, output } => {
            let output = output.unwrap_or_else(|| config.model_path.clone());
            run_train(&config, &manifest, &train_dir, &output)
        }
        Commands::Identify { manifest, json, images } => {
            run_identify(&config, &manifest, &images, json)
        }
        Commands::Sort { manifest, input, output } => run_sort(&config, &manifest, &input, &output),
        Commands::Crop { manifest, input, output, padding, force } => {
            let padding = padding.unwrap_or(config.crop_padding);
            run_crop(&manifest, &input, &output, padding, force)
        }
        Commands::Info => run_info(&config),
    }
}

fn load_model(config: &Config) -> Result<CentroidModel> {
    CentroidModel::load(&config.model_path)
        .with_context(|| format!("loading model {}", config.model_path.display()))
}

fn load_names(config: &Config) -> Result<Option<NameMap>> {
    config
        .name_map_path
        .as_deref()
        .map(|path| {
            NameMap::load(path).with_context(|| format!("loading name map {}", path.display()))
        })
        .transpose()
}

fn load_manifest(path: &Path) -> Result<ManifestExtractor> {
    ManifestExtractor::load(path).with_context(|| format!("loading manifest {}", path.display()))
}

fn run_train(config: &Config, manifest: &Path, train_dir: &Path, output: &Path) -> Result<()> {
    let mut extractor = load_manifest(manifest)?;
    let set = collect_training_set(train_dir, &mut extractor)
        .with_context(|| format!("scanning training folder {}", train_dir.display()))?;

    println!(
        "Scanned {} images: {} samples, {} without a face, {} failed",
        set.images_scanned,
        set.samples.len(),
        set.images_without_face,
        set.failures.len()
    );
    for (path, reason) in &set.failures {
        println!("  skipped {}: {reason}", path.display());
    }

    let model = CentroidModel::train(&set.samples, config.temperature)?;
    model
        .save(output)
        .with_context(|| format!("saving model {}", output.display()))?;

    println!("Trained {} people: {}", model.class_count(), set.people().join(", "));
    println!("Model saved to {}", output.display());
    Ok(())
}

fn identify_all<E: FaceExtractor>(
    config: &Config,
    extractor: &mut E,
    images: &[PathBuf],
) -> Result<Vec<ImageReport>> {
    let model = load_model(config)?;
    let names = load_names(config)?;

    let mut identifier = Identifier::new(&model, config.threshold);
    if let Some(names) = &names {
        identifier = identifier.with_names(names);
    }

    tracing::info!(
        images = images.len(),
        classes = model.class_count(),
        threshold = config.threshold,
        "identifying"
    );

    Ok(images
        .iter()
        .map(|path| identify_image(&identifier, &mut *extractor, path))
        .collect())
}

fn run_identify(config: &Config, manifest: &Path, images: &[PathBuf], json: bool) -> Result<()> {
    let mut extractor = load_manifest(manifest)?;
    let reports = identify_all(config, &mut extractor, images)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    for report in &reports {
        println!("{}", report.path.display());
        match &report.outcome {
            ImageOutcome::Faces { faces } => {
                for (i, face) in faces.iter().enumerate() {
                    let b = &face.bounding_box;
                    println!(
                        "  face {}: {:<20} {:6.2}%  (top={}, right={}, bottom={}, left={})",
                        i + 1,
                        face.result.label,
                        face.result.confidence * 100.0,
                        b.top,
                        b.right,
                        b.bottom,
                        b.left
                    );
                }
            }
            ImageOutcome::NoFace => println!("  no face detected"),
            ImageOutcome::Failed { reason } => println!("  error: {reason}"),
        }
    }
    Ok(())
}

fn run_sort(config: &Config, manifest: &Path, input: &Path, output: &Path) -> Result<()> {
    let images = list_images(input).with_context(|| format!("listing {}", input.display()))?;
    if images.is_empty() {
        bail!("no .jpg/.jpeg/.png images in {}", input.display());
    }

    let mut extractor = load_manifest(manifest)?;
    let reports = identify_all(config, &mut extractor, &images)?;

    let plan = SortPlan::from_reports(&reports);
    let copied = plan
        .apply(output)
        .with_context(|| format!("sorting into {}", output.display()))?;

    for (bucket, count) in &copied {
        println!("{bucket}: {count}");
    }
    println!(
        "Sorted {} images into {}",
        plan.total_images(),
        output.display()
    );
    Ok(())
}

fn run_crop(manifest: &Path, input: &Path, output: &Path, padding: u32, force: bool) -> Result<()> {
    let images = list_images(input).with_context(|| format!("listing {}", input.display()))?;
    if images.is_empty() {
        bail!("no .jpg/.jpeg/.png images in {}", input.display());
    }

    ensure_output_outside_input(input, output)?;
    if output.exists() {
        if !force {
            bail!(
                "output folder {} already exists; pass --force to clear it",
                output.display()
            );
        }
        tracing::info!(path = %output.display(), "clearing output folder");
        std::fs::remove_dir_all(output)
            .with_context(|| format!("clearing {}", output.display()))?;
    }
    std::fs::create_dir_all(output).with_context(|| format!("creating {}", output.display()))?;

    let mut extractor = load_manifest(manifest)?;
    let mut total_faces = 0;
    let mut problems = Vec::new();

    for image in &images {
        let faces = match extractor.extract(image) {
            Ok(faces) if faces.is_empty() => {
                problems.push(format!("{}: no face detected, skipped", image.display()));
                continue;
            }
            Ok(faces) => faces,
            Err(e) => {
                problems.push(format!("{}: {e}", image.display()));
                continue;
            }
        };

        let boxes: Vec<_> = faces.iter().map(|f| f.bounding_box).collect();
        match facesort_core::crop::crop_faces(image, &boxes, padding, output) {
            Ok(written) => total_faces += written.len(),
            Err(e) => problems.push(format!("{}: {e}", image.display())),
        }
    }

    println!("Processed {} images, saved {} face crops", images.len(), total_faces);
    if !problems.is_empty() {
        println!("Warnings:");
        for problem in &problems {
            println!("  {problem}");
        }
    }
    if total_faces == 0 && problems.len() == images.len() {
        bail!("no face crops saved: all {} images failed or had no face", images.len());
    }
    Ok(())
}

/// Refuse an output folder that is the input folder or one of its parents,
/// since clearing it would delete the source photos.
fn ensure_output_outside_input(input: &Path, output: &Path) -> Result<()> {
    if !output.exists() {
        return Ok(());
    }
    let input = input
        .canonicalize()
        .with_context(|| format!("resolving {}", input.display()))?;
    let output = output
        .canonicalize()
        .with_context(|| format!("resolving {}", output.display()))?;
    if input.starts_with(&output) {
        bail!(
            "output folder {} contains the input folder {}; choose a separate folder",
            output.display(),
            input.display()
        );
    }
    Ok(())
}

fn run_info(config: &Config) -> Result<()> {
    let model = load_model(config)?;
    println!("model:      {}", config.model_path.display());
    println!("id:         {}", model.id);
    println!("created:    {}", model.created_at);
    println!("dimension:  {}", model.dimension);
    if let Some(version) = &model.model_version {
        println!("extractor:  {version}");
    }
    println!("threshold:  {:.2}", config.threshold);
    println!("people:     {}", model.class_count());
    for class in &model.classes {
        println!("  {:<24} {} samples", class.name, class.samples);
    }
    Ok(())
}
