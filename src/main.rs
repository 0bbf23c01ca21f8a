mod classifier;
mod cli;
mod error;
mod logging;
mod metadata;
mod ml;
mod organizer;
mod scanner;
mod transfer;

use anyhow::Result;
use cli::{Config, Invocation};
use std::process::ExitCode;
use tracing::info;

fn main() -> ExitCode {
    let config = match cli::validate(std::env::args_os()) {
        Ok(Invocation::Help(usage)) => {
            println!("{}", usage);
            return ExitCode::SUCCESS;
        }
        Ok(Invocation::Run(config)) => config,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            return ExitCode::FAILURE;
        }
    };

    logging::init(config.verbose);

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(config: &Config) -> Result<()> {
    println!("FRAMEWORK = {}", ml::versions());
    println!("CONFIG = {}", config);

    if config.training_mode {
        println!("TRAINING A NEW MODEL...");
        train(config)
    } else {
        println!("ORGANIZING IMAGES...");
        organize(config)
    }
}

fn train(config: &Config) -> Result<()> {
    let outcome =
        ml::train_test_model(&config.src_dir, &config.dest_dir, &config.train_options)?;

    println!("CLASSES = {:?}", outcome.class_names);
    println!("MODEL:\n{}", outcome.model_summary);
    println!("HISTORY:\n{}", outcome.history);
    if let Some(last) = outcome.history.last() {
        info!(
            "final epoch: val_loss={:?} val_acc={:?}",
            last.valid_loss, last.valid_accuracy
        );
    }
    println!("MODEL ACCURACY:\n{}", outcome.report);
    println!("TEST RESULTS:\n{}", ml::format_predictions(&outcome.predictions));

    let metadata = ml::ModelMetadata::new(outcome.class_names, &config.train_options);
    let engine = ml::InferenceEngine::new(outcome.model, metadata);
    engine.save(&config.model_path)?;
    info!("model saved to {}", config.model_path.display());

    Ok(())
}

fn organize(config: &Config) -> Result<()> {
    let engine = ml::InferenceEngine::load(&config.model_path)?;
    info!(
        "using model {} ({} labels)",
        config.model_path.display(),
        engine.metadata().class_names.len()
    );

    let summary = organizer::organize_images_dir(
        &engine,
        &config.src_dir,
        &config.dest_dir,
        config.albums_by_year,
    )?;

    println!("Organized {} photo(s) into {} album(s):", summary.organized(), summary.albums.len());
    for (album, count) in &summary.albums {
        println!("  {} ({} files)", album, count);
    }
    if !summary.failed.is_empty() {
        println!("Skipped {} unreadable image(s)", summary.failed.len());
    }
    if summary.skipped > 0 {
        println!("Ignored {} non-image file(s)", summary.skipped);
    }

    println!("Done.");
    Ok(())
}
