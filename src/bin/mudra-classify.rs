//! Classify captured sequences from JSON files or a JSON-lines stream.

use std::io::BufRead;
use std::path::PathBuf;

use mudra::config::EngineConfig;
use mudra::landmarks::LandmarkFrame;
use mudra::service::GestureService;
use serde_json::json;

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

    if options.stream {
        return classify_stream(&service);
    }
    if options.inputs.is_empty() {
        return Err(help_text());
    }
    for path in &options.inputs {
        let raw = std::fs::read_to_string(path)
            .map_err(|err| format!("Failed to read {}: {err}", path.display()))?;
        let frames = parse_frames(&raw)?;
        let prediction = service.classify(&frames).map_err(|err| err.to_string())?;
        let rendered =
            serde_json::to_string(&prediction).map_err(|err| err.to_string())?;
        println!("{rendered}");
    }
    Ok(())
}

/// One JSON document per line on stdin, one JSON object per line on stdout,
/// failures included, after a single readiness line. Stdout line N always
/// answers stdin line N so a driving process can pair them by position.
fn classify_stream(service: &GestureService) -> Result<(), String> {
    println!("{}", json!({ "status": "ready", "mode": "streaming" }));
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line.map_err(|err| err.to_string())?;
        if line.trim().is_empty() {
            continue;
        }
        println!("{}", stream_response(service, &line));
    }
    Ok(())
}

/// Render exactly one JSON object for one request line; errors become an
/// `{"error": ...}` object instead of breaking the response pairing.
fn stream_response(service: &GestureService, line: &str) -> String {
    let result = parse_frames(line)
        .and_then(|frames| service.classify(&frames).map_err(|err| err.to_string()));
    match result {
        Ok(prediction) => serde_json::to_string(&prediction)
            .unwrap_or_else(|err| error_object(&err.to_string())),
        Err(message) => error_object(&message),
    }
}

fn error_object(message: &str) -> String {
    json!({ "error": message }).to_string()
}

/// Accepts either a bare frame array or a `{"frames": [...]}` wrapper.
fn parse_frames(raw: &str) -> Result<Vec<LandmarkFrame>, String> {
    #[derive(serde::Deserialize)]
    struct Wrapper {
        frames: Vec<LandmarkFrame>,
    }
    if let Ok(frames) = serde_json::from_str::<Vec<LandmarkFrame>>(raw) {
        return Ok(frames);
    }
    serde_json::from_str::<Wrapper>(raw)
        .map(|wrapper| wrapper.frames)
        .map_err(|err| format!("Input is not a landmark frame sequence: {err}"))
}

#[derive(Debug, Clone)]
struct CliOptions {
    data_dir: Option<PathBuf>,
    inputs: Vec<PathBuf>,
    stream: bool,
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut data_dir: Option<PathBuf> = None;
    let mut inputs = Vec::new();
    let mut stream = false;

    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => return Err(help_text()),
            "--data" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--data requires a value".to_string())?;
                data_dir = Some(PathBuf::from(value));
            }
            "--stream" => stream = true,
            other if other.starts_with('-') => {
                return Err(format!("Unknown argument: {other}\n{}", help_text()));
            }
            path => inputs.push(PathBuf::from(path)),
        }
        idx += 1;
    }

    if stream && !inputs.is_empty() {
        return Err("--stream does not take input files".to_string());
    }
    Ok(CliOptions {
        data_dir,
        inputs,
        stream,
    })
}


fn help_text() -> String {
    "Usage: mudra-classify [--data <dir>] <frames.json>...\n\
     \u{20}      mudra-classify [--data <dir>] --stream\n\
     Classifies captured landmark sequences against the stored gesture set.\n\
     Inputs are JSON frame arrays (or {\"frames\": [...]}); --stream reads one\n\
     JSON document per line from stdin."
        .to_string()
}
