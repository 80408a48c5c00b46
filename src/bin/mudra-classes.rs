//! Manage gesture classes and stored sequences from the command line.

use std::path::PathBuf;

use mudra::config::EngineConfig;
use mudra::service::GestureService;
use uuid::Uuid;

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
        Some(dir) => GestureService::open(dir, EngineConfig::default())
            .map_err(|err| err.to_string())?,
        None => GestureService::open_default().map_err(|err| err.to_string())?,
    };

    match options.command {
        Command::List => {
            let classes = service.list_classes().map_err(|err| err.to_string())?;
            if classes.is_empty() {
                println!("no gesture classes stored");
                return Ok(());
            }
            for status in classes {
                println!(
                    "{:<16} \"{}\"  window={:.1}s  sequences={:<4} frames={:<6} {}",
                    status.class.name,
                    status.class.display_name,
                    status.class.duration_seconds,
                    status.class.sequence_count,
                    status.class.total_frames,
                    if status.stale { "stale" } else { "trained" }
                );
            }
        }
        Command::Create {
            name,
            display_name,
            duration_seconds,
        } => {
            service
                .create_class(&name, &display_name, duration_seconds)
                .map_err(|err| err.to_string())?;
            println!("created class {name}");
        }
        Command::Delete { name } => {
            service.delete_class(&name).map_err(|err| err.to_string())?;
            println!("deleted class {name} and its sequences");
        }
        Command::Sequences { class_name } => {
            let summaries = service
                .list_sequences(&class_name)
                .map_err(|err| err.to_string())?;
            for summary in summaries {
                println!(
                    "{}  recorded_at={}  frames={}  fps={:.1}",
                    summary.id,
                    summary.recorded_at,
                    summary.metadata.frame_count,
                    summary.metadata.fps
                );
            }
        }
        Command::DeleteSequence { id } => {
            service.delete_sequence(id).map_err(|err| err.to_string())?;
            println!("deleted sequence {id}");
        }
        Command::Export { id, out } => {
            let frames = service
                .export_fixed_length(id)
                .map_err(|err| err.to_string())?;
            let rendered = serde_json::to_string(&frames).map_err(|err| err.to_string())?;
            match out {
                Some(path) => std::fs::write(&path, rendered)
                    .map_err(|err| format!("Failed to write {}: {err}", path.display()))?,
                None => println!("{rendered}"),
            }
        }
    }
    Ok(())
}

#[derive(Debug, Clone)]
enum Command {
    List,
    Create {
        name: String,
        display_name: String,
        duration_seconds: f32,
    },
    Delete {
        name: String,
    },
    Sequences {
        class_name: String,
    },
    DeleteSequence {
        id: Uuid,
    },
    Export {
        id: Uuid,
        out: Option<PathBuf>,
    },
}

#[derive(Debug, Clone)]
struct CliOptions {
    data_dir: Option<PathBuf>,
    command: Command,
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut data_dir: Option<PathBuf> = None;
    let mut positional: Vec<String> = Vec::new();
    let mut duration_seconds = 3.0f32;
    let mut display_name: Option<String> = None;
    let mut out: Option<PathBuf> = None;

    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => return Err(help_text()),
            "--data" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--data requires a value".to_string())?;
                data_dir = Some(PathBuf::from(value));
            }
            "--duration" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--duration requires a value".to_string())?;
                duration_seconds = value
                    .parse::<f32>()
                    .map_err(|_| format!("Invalid --duration value: {value}"))?;
            }
            "--display" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--display requires a value".to_string())?;
                display_name = Some(value.clone());
            }
            "--out" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--out requires a value".to_string())?;
                out = Some(PathBuf::from(value));
            }
            other if other.starts_with('-') => {
                return Err(format!("Unknown argument: {other}\n{}", help_text()));
            }
            value => positional.push(value.to_string()),
        }
        idx += 1;
    }

    let command = match positional.first().map(String::as_str) {
        None | Some("list") => Command::List,
        Some("create") => {
            let name = positional
                .get(1)
                .ok_or_else(|| "create requires a class name".to_string())?
                .clone();
            Command::Create {
                display_name: display_name.unwrap_or_else(|| name.clone()),
                name,
                duration_seconds,
            }
        }
        Some("delete") => Command::Delete {
            name: positional
                .get(1)
                .ok_or_else(|| "delete requires a class name".to_string())?
                .clone(),
        },
        Some("sequences") => Command::Sequences {
            class_name: positional
                .get(1)
                .ok_or_else(|| "sequences requires a class name".to_string())?
                .clone(),
        },
        Some("delete-sequence") => Command::DeleteSequence {
            id: parse_sequence_id(&positional)?,
        },
        Some("export") => Command::Export {
            id: parse_sequence_id(&positional)?,
            out,
        },
        Some(other) => return Err(format!("Unknown command: {other}\n{}", help_text())),
    };

    Ok(CliOptions { data_dir, command })
}

fn parse_sequence_id(positional: &[String]) -> Result<Uuid, String> {
    let raw = positional
        .get(1)
        .ok_or_else(|| "a sequence id is required".to_string())?;
    Uuid::parse_str(raw).map_err(|_| format!("Invalid sequence id: {raw}"))
}

fn help_text() -> String {
    "Usage: mudra-classes [--data <dir>] <command>\n\
     Commands:\n\
     \u{20} list                              list classes with staleness\n\
     \u{20} create <name> [--duration <s>] [--display <name>]\n\
     \u{20} delete <name>                     delete a class and its sequences\n\
     \u{20} sequences <class>                 list a class's stored sequences\n\
     \u{20} delete-sequence <id>              remove one sequence\n\
     \u{20} export <id> [--out <file>]        fixed-length resampled JSON"
        .to_string()
}
