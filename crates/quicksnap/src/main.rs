use std::io::BufRead;

use quicksnap_lib::command::{execute_json, execute_json_batch, SnapDriver};
use quicksnap_lib::harness::SceneHarness;
use quicksnap_lib::settings::SnapSettings;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quicksnap=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args();
    let Some(scene) = args.scene.as_deref().and_then(load_scene) else {
        eprintln!("Usage: quicksnap --scene <scene.json> [--script <commands.json>] [--save-settings]");
        std::process::exit(2);
    };

    let settings = SnapSettings::load();
    if args.save_settings {
        settings.save();
        tracing::info!("Settings saved");
    }
    let mut driver = SnapDriver::new(SceneHarness::new(scene), settings);

    match args.script {
        Some(path) => run_script(&mut driver, &path),
        None => run_stdin(&mut driver),
    }
}

#[derive(Default)]
struct Args {
    scene: Option<String>,
    script: Option<String>,
    /// Write the loaded (or default) settings back to the config file
    save_settings: bool,
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = Args::default();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--scene" if i + 1 < args.len() => {
                parsed.scene = Some(args[i + 1].clone());
                i += 1;
            }
            "--script" if i + 1 < args.len() => {
                parsed.script = Some(args[i + 1].clone());
                i += 1;
            }
            "--save-settings" => parsed.save_settings = true,
            other => tracing::warn!("Ignoring argument {other}"),
        }
        i += 1;
    }
    parsed
}

fn load_scene(path: &str) -> Option<shared::SceneDescription> {
    match std::fs::read_to_string(path) {
        Ok(json) => match serde_json::from_str::<shared::SceneDescription>(&json) {
            Ok(scene) => {
                tracing::info!("Loaded scene from {path} ({} objects)", scene.objects.len());
                Some(scene)
            }
            Err(e) => {
                tracing::error!("Failed to parse scene JSON from {path}: {e}");
                None
            }
        },
        Err(e) => {
            tracing::error!("Failed to read scene file {path}: {e}");
            None
        }
    }
}

/// Run a JSON array of commands and print every response
fn run_script(driver: &mut SnapDriver, path: &str) {
    let json = match std::fs::read_to_string(path) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!("Failed to read script {path}: {e}");
            std::process::exit(1);
        }
    };
    match execute_json_batch(driver, &json) {
        Ok(responses) => {
            for resp in responses {
                println!("{}", serde_json::to_string(&resp).unwrap_or_default());
            }
        }
        Err(e) => {
            tracing::error!("{e}");
            std::process::exit(1);
        }
    }
}

/// One JSON command per line until end of input
fn run_stdin(driver: &mut SnapDriver) {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::error!("Failed to read input: {e}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match execute_json(driver, &line) {
            Ok(resp) => println!("{}", serde_json::to_string(&resp).unwrap_or_default()),
            Err(e) => println!("{}", serde_json::json!({ "success": false, "error": e })),
        }
    }
}
