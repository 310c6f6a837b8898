//! Headless mode runner - host simulation over stdin/stdout
//!
//! Lifecycle signals arrive as text commands on stdin, one per line.
//! Frames and engine events leave as NDJSON on stdout.

use chrono::FixedOffset;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use sunface_app::{transport_for, Engine, EngineEvent, HostSignal, Message, Renderer, Settings};
use sunface_core::prelude::*;
use sunface_core::RenderFrame;

use super::HeadlessEvent;

/// Renderer that writes each frame to stdout as a `frame` event
#[derive(Debug, Default, Clone, Copy)]
pub struct NdjsonRenderer;

impl Renderer for NdjsonRenderer {
    fn render(&self, frame: &RenderFrame) -> Result<()> {
        let mut stdout = std::io::stdout().lock();
        HeadlessEvent::frame(frame)
            .write_to(&mut stdout)
            .map_err(|e| Error::render(e.to_string()))
    }
}

/// Run in headless mode until `quit` or end of input
pub async fn run_headless(settings: Settings) -> Result<()> {
    info!("═══════════════════════════════════════════════════════");
    info!("sunface starting in HEADLESS mode");
    match &settings.peer.address {
        Some(address) => info!("Peer: {}", address),
        None => info!("Peer: loopback"),
    }
    info!("═══════════════════════════════════════════════════════");

    let timezone = *chrono::Local::now().offset();
    let mut engine = Engine::new(&settings, timezone, Box::new(NdjsonRenderer), |events| {
        transport_for(&settings.peer, events)
    });

    let printer = spawn_event_printer(engine.subscribe());

    // Blocking reads stay off the runtime
    let stdin_tx = engine.msg_sender();
    std::thread::spawn(move || {
        read_stdin_blocking(stdin_tx);
    });

    engine.run().await;
    engine.shutdown();

    // Dropping the engine closes the broadcast so the printer drains and ends
    drop(engine);
    if let Err(e) = printer.await {
        warn!("Event printer task failed: {}", e);
    }

    info!("sunface headless mode exiting");
    Ok(())
}

/// Forward engine events to stdout until the engine is gone
fn spawn_event_printer(mut events: broadcast::Receiver<EngineEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    trace!("Engine event: {}", event.event_type());
                    if let Some(out) = HeadlessEvent::from_engine_event(&event) {
                        out.emit();
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Event printer lagged, {} events dropped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

/// Read host commands from stdin and post them to the engine (blocking)
fn read_stdin_blocking(msg_tx: mpsc::Sender<Message>) {
    use std::io::BufRead;

    let stdin = std::io::stdin();
    let reader = stdin.lock();

    for line in reader.lines() {
        match line {
            Ok(line) => {
                let Some(msg) = parse_command(&line) else {
                    continue;
                };
                let quit = msg == Message::Quit;
                if msg_tx.blocking_send(msg).is_err() || quit {
                    return;
                }
            }
            Err(e) => {
                error!("Failed to read stdin: {}", e);
                HeadlessEvent::error(format!("Failed to read stdin: {}", e), false).emit();
                break;
            }
        }
    }

    info!("Stdin closed, stopping");
    let _ = msg_tx.blocking_send(Message::Quit);
}

/// Map one stdin line to a message.
///
/// Empty lines and unknown commands yield `None`.
pub fn parse_command(line: &str) -> Option<Message> {
    let trimmed = line.trim();
    let (command, arg) = match trimmed.split_once(char::is_whitespace) {
        Some((command, arg)) => (command, Some(arg.trim())),
        None => (trimmed, None),
    };

    let msg = match (command, arg) {
        ("", _) => return None,
        ("visible" | "show", None) => HostSignal::VisibilityChanged(true).into(),
        ("hidden" | "hide", None) => HostSignal::VisibilityChanged(false).into(),
        ("ambient", None) => HostSignal::AmbientModeChanged(true).into(),
        ("interactive", None) => HostSignal::AmbientModeChanged(false).into(),
        ("sync", None) => Message::Resync,
        ("q" | "quit", None) => Message::Quit,
        ("tz", Some(offset)) => match parse_offset(offset) {
            Some(zone) => HostSignal::TimezoneChanged(zone).into(),
            None => {
                warn!("Invalid UTC offset: {}", offset);
                return None;
            }
        },
        _ => {
            warn!("Unknown stdin command: {}", trimmed);
            return None;
        }
    };
    debug!("Stdin: {}", trimmed);
    Some(msg)
}

/// Parse `+HH:MM`, `-HH:MM`, `+HHMM` or `Z`
fn parse_offset(text: &str) -> Option<FixedOffset> {
    if text.eq_ignore_ascii_case("z") || text.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0);
    }

    let (sign, rest) = match text.as_bytes().first()? {
        b'+' => (1, &text[1..]),
        b'-' => (-1, &text[1..]),
        _ => return None,
    };
    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h, m),
        None if rest.len() == 4 && rest.is_ascii() => rest.split_at(2),
        None => (rest, "0"),
    };

    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if !(0..24).contains(&hours) || !(0..60).contains(&minutes) {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}
