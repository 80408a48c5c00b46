//! Run a training pass from the command line and report its accuracy.

use std::path::PathBuf;
use std::time::Duration;

use mudra::config::EngineConfig;
use mudra::service::GestureService;
use mudra::training::TrainingStatus;

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let options = parse_args(std::env::args().skip(1).collect())?;
    mudra::logging::init().map_err(|err| err.to_string())?;

    let service = match options.data_dir {
        Some(dir) => {
            let config = match &options.config_path {
                Some(path) => EngineConfig::load_from(path).map_err(|err| err.to_string())?,
                None => EngineConfig::default(),
            };
            GestureService::open(dir, config).map_err(|err| err.to_string())?
        }
        None => GestureService::open_default().map_err(|err| err.to_string())?,
    };

    let classes = service.list_classes().map_err(|err| err.to_string())?;
    if classes.is_empty() {
        return Err("No gesture classes stored; record some sequences first".to_string());
    }
    for status in &classes {
        println!(
            "class {:<16} sequences={:<4} {}",
            status.class.name,
            status.class.sequence_count,
            if status.stale { "stale" } else { "trained" }
        );
    }

    service.start_training().map_err(|err| err.to_string())?;
    let mut last_reported = 0usize;
    loop {
        let status = service
            .training_status()
            .map_err(|err| err.to_string())?
            .ok_or_else(|| "Training status unavailable".to_string())?;
        match status {
            TrainingStatus::Running {
                completed_pairs,
                total_pairs,
            } => {
                // Progress line roughly every 10% of the pairwise work.
                let step = (total_pairs / 10).max(1);
                if completed_pairs >= last_reported + step {
                    println!("compared {completed_pairs}/{total_pairs} sequence pairs");
                    last_reported = completed_pairs;
                }
                std::thread::sleep(Duration::from_millis(options.poll_ms));
            }
            _ => break,
        }
    }

    let status = service
        .wait_for_training()
        .map_err(|err| err.to_string())?
        .ok_or_else(|| "Training status unavailable".to_string())?;
    let outcome = match status {
        TrainingStatus::Completed(outcome) => outcome,
        TrainingStatus::Cancelled => return Err("Training was cancelled".to_string()),
        TrainingStatus::Failed(message) => return Err(message),
        TrainingStatus::Running { .. } => unreachable!("joined worker cannot still be running"),
    };

    println!(
        "overall accuracy: {:.4} ({} classes, {} sequences, k={})",
        outcome.snapshot.final_accuracy,
        outcome.snapshot.num_classes,
        outcome.snapshot.total_samples,
        outcome.snapshot.k
    );
    for stats in &outcome.per_class {
        println!(
            "class {:<16} accuracy={:.3}  support={}",
            stats.class_name, stats.accuracy, stats.support
        );
    }
    Ok(())
}

#[derive(Debug, Clone)]
struct CliOptions {
    data_dir: Option<PathBuf>,
    config_path: Option<PathBuf>,
    poll_ms: u64,
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut data_dir: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;
    let mut poll_ms = 200u64;

    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => return Err(help_text()),
            "--data" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--data requires a value".to_string())?;
                data_dir = Some(PathBuf::from(value));
            }
            "--config" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--config requires a value".to_string())?;
                config_path = Some(PathBuf::from(value));
            }
            "--poll-ms" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--poll-ms requires a value".to_string())?;
                poll_ms = value
                    .parse::<u64>()
                    .map_err(|_| format!("Invalid --poll-ms value: {value}"))?;
            }
            other => return Err(format!("Unknown argument: {other}\n{}", help_text())),
        }
        idx += 1;
    }

    Ok(CliOptions {
        data_dir,
        config_path,
        poll_ms,
    })
}

fn help_text() -> String {
    "Usage: mudra-train [--data <dir>] [--config <config.toml>] [--poll-ms <ms>]\n\
     Runs leave-one-out validation over all stored sequences and saves the\n\
     model snapshot. Without --data the default .mudra data directory is used."
        .to_string()
}
