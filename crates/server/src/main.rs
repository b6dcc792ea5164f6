//! Trellis - script engine demo host
//!
//! Loads the scripts folder, ticks the engine on one fixed thread and turns
//! console lines into events:
//! - `name: message` fires a chat event from the console thread
//! - `/reload [script]`, `/unload <script>` and `/scripts` manage scripts
//! - `/quit` (or end of input) stops the host

mod host;

use anyhow::Context;
use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;
use trellis_config::{EngineConfig, ReportFormat};
use trellis_scripting::{EngineOptions, LoadReport, ScriptEngine};

/// Console commands handled on the tick thread
#[derive(Debug)]
enum Command {
    Reload(Option<String>),
    Unload(String),
    Scripts,
    Quit,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let (config, config_error) = match EngineConfig::load_default() {
        Ok(config) => (config, None),
        Err(e) => (EngineConfig::default(), Some(e)),
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.verbosity.filter_directive()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Some(e) = config_error {
        warn!("Failed to load engine options: {}", e);
        warn!("Using default configuration");
    }
    config.display();

    let options = EngineOptions {
        tick: config.tick_duration(),
        sync_timeout: config.sync_timeout(),
        warn_missing_and: config.warn_missing_and,
        script_extension: config.script_extension.clone(),
        disabled_prefix: config.disabled_prefix.clone(),
    };
    let registry = host::registry().context("registering the script vocabulary failed")?;
    let engine = Arc::new(ScriptEngine::new(registry, options, Arc::new(host::ConsoleHost)));

    // Triggers, delays and handed-off events all run on this thread
    engine.runtime().scheduler().bind_main_thread();

    load_all(&engine, &config.scripts_folder, config.report_format);

    let (commands, mut received) = mpsc::unbounded_channel();
    spawn_console(Arc::clone(&engine), commands);

    let mut ticker = tokio::time::interval(config.tick_duration());
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!("Ticking every {} ms; type 'name: message' to chat", config.tick_millis);
    loop {
        tokio::select! {
            _ = ticker.tick() => engine.tick(),
            command = received.recv() => match command {
                Some(Command::Quit) | None => break,
                Some(command) => handle(&engine, &config, command),
            },
            _ = &mut shutdown => {
                info!("Interrupted");
                break;
            }
        }
    }

    engine.unload_all();
    info!("{} trigger execution(s) failed during this run", engine.runtime().failures());
    Ok(())
}

fn load_all(engine: &ScriptEngine, folder: &Path, format: ReportFormat) {
    match engine.load_directory(folder) {
        Ok(report) => print_report(&report, format),
        Err(e) => error!("Could not load scripts from {}: {}", folder.display(), e),
    }
}

fn print_report(report: &LoadReport, format: ReportFormat) {
    match format {
        ReportFormat::Text => print!("{}", report),
        ReportFormat::Json => match serde_json::to_string_pretty(report) {
            Ok(json) => println!("{}", json),
            Err(e) => error!("Could not serialize the load report: {}", e),
        },
    }
}

fn handle(engine: &ScriptEngine, config: &EngineConfig, command: Command) {
    debug!("Console command: {:?}", command);
    match command {
        Command::Reload(None) => {
            engine.unload_all();
            load_all(engine, &config.scripts_folder, config.report_format);
        }
        Command::Reload(Some(name)) => match engine.reload(&name) {
            Ok(script) => {
                let mut report = LoadReport::default();
                report.push(script);
                print_report(&report, config.report_format);
            }
            Err(e) => warn!("Can't reload '{}': {}", name, e),
        },
        Command::Unload(name) => {
            if let Err(e) = engine.unload(&name) {
                warn!("Can't unload '{}': {}", name, e);
            }
        }
        Command::Scripts => {
            for name in engine.script_names() {
                println!("  {}", name);
            }
            println!("{} trigger(s) loaded", engine.trigger_count());
        }
        Command::Quit => {}
    }
}

fn parse_command(line: &str) -> Option<Command> {
    let mut words = line.strip_prefix('/')?.split_whitespace();
    let command = match (words.next()?, words.next()) {
        ("reload", name) => Command::Reload(name.map(str::to_string)),
        ("unload", Some(name)) => Command::Unload(name.to_string()),
        ("scripts", None) => Command::Scripts,
        ("quit", None) => Command::Quit,
        _ => return None,
    };
    Some(command)
}

/// Read console lines on their own thread
///
/// Chat lines are fired right here, off the tick thread, so each one goes
/// through the main-thread handoff and blocks until a tick delivers it.
fn spawn_console(engine: Arc<ScriptEngine>, commands: mpsc::UnboundedSender<Command>) {
    let spawned = std::thread::Builder::new()
        .name("console".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        warn!("Console read failed: {}", e);
                        break;
                    }
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line.starts_with('/') {
                    match parse_command(line) {
                        Some(command) => {
                            if commands.send(command).is_err() {
                                return;
                            }
                        }
                        None => warn!("Unknown command: {}", line),
                    }
                    continue;
                }
                match host::chat_event(line) {
                    Some(event) => match engine.fire(event) {
                        Ok(count) => debug!("Chat ran {} trigger(s)", count),
                        Err(e) => warn!("Chat event was dropped: {}", e),
                    },
                    None => warn!("Expected 'name: message', got '{}'", line),
                }
            }
            let _ = commands.send(Command::Quit);
        });
    if let Err(e) = spawned {
        error!("Could not start the console thread: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command() {
        assert!(matches!(parse_command("/reload"), Some(Command::Reload(None))));
        assert!(matches!(parse_command("/reload a.sk"), Some(Command::Reload(Some(n))) if n == "a.sk"));
        assert!(matches!(parse_command("/unload a.sk"), Some(Command::Unload(n)) if n == "a.sk"));
        assert!(matches!(parse_command("/scripts"), Some(Command::Scripts)));
        assert!(parse_command("/unload").is_none());
        assert!(parse_command("hello").is_none());
    }
}
