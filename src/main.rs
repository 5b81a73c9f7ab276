use anyhow::{Context, Result};
use chatter::integration::{
    spawn, ControllerEvent, DocumentLibrary, SessionConfig, Submission, TurnController,
    TurnOutcome,
};
use chatter::llm::{GeminiClient, GenerationService, ServiceConfig};
use chatter::messages::{Role, Turn};
use parking_lot::RwLock;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const HELP: &str = "Commands: /image <path> [text], /doc <path>, /nodoc, /voice on|off, /clear, /quit";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chatter=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting Chatter");

    let session = match std::env::args().nth(1) {
        Some(path) => SessionConfig::load(&path).with_context(|| format!("loading {}", path))?,
        None => SessionConfig::default(),
    };

    let service_config = ServiceConfig::from_env().context("reading API key")?;
    let service: Arc<dyn GenerationService> =
        Arc::new(GeminiClient::new(service_config.clone())?);

    let controller = build_controller(service, &service_config);
    let settings = Arc::new(RwLock::new(session));
    let (handle, worker) = spawn(controller, Arc::clone(&settings));

    let events = handle.event_receiver();
    std::thread::spawn(move || render_events(events));

    handle.greet()?;
    println!("{}", HELP);

    let mut documents = DocumentLibrary::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let accepted = match line.split_once(' ').unwrap_or((line, "")) {
            ("/quit", _) => break,
            ("/clear", _) => handle.clear_history()?,
            ("/image", rest) => {
                let (path, text) = rest.trim().split_once(' ').unwrap_or((rest.trim(), ""));
                handle.submit_with_file(text.trim(), path)?
            }
            ("/doc", path) => {
                match documents.load_file(path.trim()).await {
                    Ok(name) => {
                        documents.set_active(Some(&name))?;
                        settings.write().document = documents.active_content().map(str::to_string);
                        println!("[\"{}\" is now the active context]", name);
                    }
                    Err(e) => println!("[{}]", e),
                }
                true
            }
            ("/nodoc", _) => {
                documents.set_active(None)?;
                settings.write().document = None;
                true
            }
            ("/voice", flag) => {
                settings.write().voice_output_enabled = flag.trim() != "off";
                true
            }
            (command, _) if command.starts_with('/') => {
                println!("{}", HELP);
                true
            }
            _ => handle.submit(Submission::text(line))?,
        };

        if !accepted {
            println!("[busy, try again when the reply is done]");
        }
    }

    handle.shutdown()?;
    if let Err(e) = worker.await {
        warn!("Controller worker ended abnormally: {}", e);
    }
    Ok(())
}

#[cfg(feature = "audio-io")]
fn build_controller(
    service: Arc<dyn GenerationService>,
    config: &ServiceConfig,
) -> TurnController {
    use chatter::audio::CpalSink;
    use chatter::speech::VoicePlayback;

    let playback =
        VoicePlayback::from_config(Arc::clone(&service), Arc::new(CpalSink::new()), config);
    TurnController::new(service).with_playback(playback)
}

#[cfg(not(feature = "audio-io"))]
fn build_controller(
    service: Arc<dyn GenerationService>,
    _config: &ServiceConfig,
) -> TurnController {
    TurnController::new(service)
}

/// Print streamed text as it grows
fn render_events(events: crossbeam_channel::Receiver<ControllerEvent>) {
    let mut shown = String::new();
    let mut reply: Option<Turn> = None;
    let mut stdout = std::io::stdout();

    for event in events.iter() {
        match event {
            ControllerEvent::TurnStarted { .. } => {
                shown.clear();
                reply = None;
                print!("model> ");
            }
            ControllerEvent::TranscriptUpdated(turns) => {
                let Some(last) = turns.last().filter(|t| t.role() == Role::Model) else {
                    continue;
                };
                if turns.len() == 1 {
                    println!("model> {}", last.text());
                    continue;
                }
                match last.text().strip_prefix(shown.as_str()) {
                    Some(rest) => print!("{}", rest),
                    None => print!("\nmodel> {}", last.text()),
                }
                shown = last.text().to_string();
                reply = Some(last.clone());
            }
            ControllerEvent::TurnResolved(outcome) => {
                println!();
                if let TurnOutcome::Failed(cause) = outcome {
                    warn!("Turn failed: {}", cause);
                }
                if let Some(turn) = reply.take() {
                    if turn.image().is_some() {
                        println!("  (image attached)");
                    }
                    for source in turn.sources() {
                        println!("  - {} <{}>", source.title, source.uri);
                    }
                }
            }
            ControllerEvent::SubmissionRejected(reason) => {
                println!("[rejected: {:?}]", reason);
            }
            ControllerEvent::PlaybackFinished(outcome) => {
                info!("Playback finished: {:?}", outcome);
            }
            ControllerEvent::HistoryCleared => println!("[history cleared]"),
            ControllerEvent::Notice(text) => println!("[{}]", text),
        }
        let _ = stdout.flush();
    }
}
