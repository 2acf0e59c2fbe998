use std::io::{self, BufRead, Write};

use clap::Args;
use speakerlight_core::ambient::status_lines;
use speakerlight_core::error::PresentationError;
use speakerlight_core::signal::{SignalFrame, SignalTarget};
use speakerlight_core::timer::{ColorState, MarkerInput, MarkerSet, RunState, Signal};
use speakerlight_core::{
    format_time, Command, Config, Database, DriverHandle, EventListener, PresetId, SessionRecord,
    TimerDriver, TimerSession,
};
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::fmt_marker;

type BoxError = Box<dyn std::error::Error>;

#[derive(Args)]
pub struct RunArgs {
    /// Load a named preset (e.g. "Prepared Speech")
    #[arg(long, conflicts_with_all = ["speakers", "green", "yellow", "red"])]
    preset: Option<String>,
    /// Table topics evaluation for N speakers (1-10)
    #[arg(long, allow_negative_numbers = true, conflicts_with_all = ["green", "yellow", "red"])]
    speakers: Option<i64>,
    /// Speaker name stored with the session record
    #[arg(long)]
    speaker: Option<String>,
    /// Custom green marker, M:S
    #[arg(long, value_parser = MarkerInput::parse, requires_all = ["yellow", "red"])]
    green: Option<MarkerInput>,
    /// Custom yellow marker, M:S
    #[arg(long, value_parser = MarkerInput::parse, requires_all = ["green", "red"])]
    yellow: Option<MarkerInput>,
    /// Custom red marker, M:S
    #[arg(long, value_parser = MarkerInput::parse, requires_all = ["green", "yellow"])]
    red: Option<MarkerInput>,
}

impl RunArgs {
    /// Commands that set the session up before the first key press.
    fn setup(self) -> Vec<Command> {
        let mut commands = Vec::new();
        if let Some(name) = self.preset {
            commands.push(Command::LoadPreset(PresetId::Named(name)));
        }
        if let Some(n) = self.speakers {
            commands.push(Command::LoadPreset(PresetId::MultiSpeaker(n)));
        }
        if let (Some(green), Some(yellow), Some(red)) = (self.green, self.yellow, self.red) {
            commands.push(Command::SetCustomMarkers { green, yellow, red });
        }
        if self.speaker.is_some() {
            commands.push(Command::SetSpeaker(self.speaker));
        }
        commands
    }
}

const HELP: &str = "keys: t start | p pause/resume | s stop | r reset | g/y/e flash green/yellow/red | q quit";

fn key_command(key: &str) -> Option<Command> {
    let command = match key {
        "t" => Command::Start,
        "p" => Command::Toggle,
        "s" => Command::Stop,
        "r" => Command::Reset,
        "g" => Command::Flash(ColorState::Green),
        "y" => Command::Flash(ColorState::Yellow),
        "e" => Command::Flash(ColorState::Red),
        _ => return None,
    };
    Some(command)
}

/// Single status line on stdout, redrawn in place.
struct TerminalTarget {
    last: Option<(Signal, u64, bool)>,
}

impl TerminalTarget {
    fn new() -> Self {
        Self { last: None }
    }
}

fn hex_rgb(hex: &str) -> (u8, u8, u8) {
    let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2).unwrap_or("00"), 16).unwrap_or(0);
    (channel(1), channel(3), channel(5))
}

impl SignalTarget for TerminalTarget {
    fn name(&self) -> &str {
        "terminal"
    }

    fn render(&mut self, frame: &SignalFrame) -> Result<(), PresentationError> {
        // Redraw at most once per tenth of a second.
        let key = (frame.signal, frame.elapsed_ms / 100, frame.flashing);
        if self.last == Some(key) {
            return Ok(());
        }
        self.last = Some(key);

        let (br, bg, bb) = hex_rgb(frame.background_hex());
        let (fr, fg, fb) = hex_rgb(frame.foreground_hex());
        let flash = if frame.flashing { " (flash)" } else { "" };
        let mut out = io::stdout().lock();
        write!(
            out,
            "\r\x1b[2K\x1b[48;2;{br};{bg};{bb}m\x1b[38;2;{fr};{fg};{fb}m  {:<8} {}{flash}  \x1b[0m",
            frame.signal.label.as_str(),
            format_time(frame.elapsed_ms),
        )
        .and_then(|_| out.flush())
        .map_err(|e| match e.kind() {
            io::ErrorKind::BrokenPipe => PresentationError::Unavailable {
                target: "terminal".into(),
            },
            _ => PresentationError::RenderFailed {
                target: "terminal".into(),
                message: e.to_string(),
            },
        })
    }
}

/// Prints state changes, marker loads and records below the signal line.
struct ConsoleListener;

impl EventListener for ConsoleListener {
    fn on_state_changed(&mut self, _from: RunState, to: RunState) {
        if to == RunState::Paused {
            println!("\r\n[paused]");
        }
    }

    fn on_markers_changed(&mut self, markers: &MarkerSet, preset: Option<&str>) {
        println!(
            "\r\n{}: green {} | yellow {} | red {}",
            preset.unwrap_or("Custom"),
            fmt_marker(markers.green_ms),
            fmt_marker(markers.yellow_ms),
            fmt_marker(markers.red_ms),
        );
    }

    fn on_record_created(&mut self, record: &SessionRecord) {
        println!("\r\nRecorded: {}", record.summary());
    }

    fn on_presentation_unavailable(&mut self, target: &str, paused: bool) {
        if paused {
            eprintln!("\r\nsignal display '{target}' went away; timer paused");
        } else {
            eprintln!("\r\nsignal display '{target}' went away");
        }
    }
}

/// Forward stdin lines from a blocking reader thread.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line.trim().to_lowercase()).is_err() {
                break;
            }
        }
    });
    rx
}

async fn drive(
    handle: &DriverHandle,
    setup: Vec<Command>,
    mut keys: mpsc::UnboundedReceiver<String>,
) -> Result<(), BoxError> {
    for command in setup {
        handle.execute(command).await?;
    }
    println!("{HELP}");

    while let Some(key) = keys.recv().await {
        if key == "q" {
            break;
        }
        match key_command(&key) {
            Some(command) => {
                if let Err(e) = handle.execute(command).await {
                    debug!(key = %key, error = %e, "key command rejected");
                    eprintln!("\r\n{e}");
                }
            }
            None if key.is_empty() => {}
            None => {
                debug!(key = %key, "unrecognised key");
                println!("\r\n{HELP}");
            }
        }
    }

    let snapshot = handle.snapshot().await?;
    if snapshot.run_state != RunState::Stopped {
        info!(
            state = %snapshot.run_state,
            elapsed_ms = snapshot.elapsed_ms,
            "quit with an unfinished session"
        );
        println!(
            "\r\nquit at {} without stopping; no record saved",
            format_time(snapshot.elapsed_ms)
        );
    }
    Ok(())
}

pub fn run(args: RunArgs) -> Result<(), BoxError> {
    let config = Config::load_or_default();
    let db = Database::open()?;

    for line in status_lines(&chrono::Local::now(), &config.ambient) {
        println!("{line}");
    }

    let mut session = TimerSession::from_config(&config, Box::new(db));
    session
        .broadcaster_mut()
        .add_primary(Box::new(TerminalTarget::new()));
    session.subscribe(Box::new(ConsoleListener));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;

    let setup = args.setup();
    debug!(setup_commands = setup.len(), "starting terminal session");
    let keys = spawn_stdin_reader();
    let (driver, handle) = TimerDriver::new(session);

    let (_session, outcome) = runtime.block_on(async {
        tokio::join!(driver.run(), async {
            let outcome = drive(&handle, setup, keys).await;
            handle.shutdown().await;
            outcome
        })
    });
    println!();
    outcome
}
