use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use futures::StreamExt;
use tracing_subscriber::EnvFilter;

use podium_gateway::audio::{AudioCapture, samples_to_wav};
use podium_gateway::navigation::{NavOutcome, Navigator};
use podium_gateway::protocol::RelayEvent;
use podium_gateway::session::CaptureSession;
use podium_gateway::{Config, PresentationState, deck};

/// Podium - voice-driven presentation gateway
#[derive(Parser)]
#[command(name = "podium", version, about)]
struct Cli {
    /// Path to config file (default: ~/.config/podium/config.toml)
    #[arg(short, long, env = "PODIUM_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the relay server
    Serve {
        /// Port to listen on
        #[arg(long, env = "PODIUM_PORT")]
        port: Option<u16>,
    },
    /// Present a deck: capture the microphone and navigate by voice
    Listen {
        /// Path to the deck file (JSON array of sections)
        deck: PathBuf,

        /// Relay URL to connect to
        #[arg(long, env = "PODIUM_RELAY_URL")]
        relay_url: Option<String>,
    },
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,

        /// Write the captured audio to a WAV file
        #[arg(long)]
        dump: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,podium_gateway=info",
        1 => "info,podium_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Serve { port } => {
            if let Some(port) = port {
                config.port = port;
            }
            tracing::info!(port = config.port, "starting relay");
            podium_gateway::relay::serve(&config).await?;
            Ok(())
        }
        Command::Listen { deck, relay_url } => {
            if let Some(url) = relay_url {
                config.relay_url = url;
            }
            run_listen(&config, &deck).await
        }
        Command::TestMic { duration, dump } => test_mic(duration, dump.as_deref()).await,
    }
}

/// Drive a deck from the microphone until interrupted
#[allow(clippy::future_not_send)]
async fn run_listen(config: &Config, deck_path: &std::path::Path) -> anyhow::Result<()> {
    let sections = deck::load_deck(deck_path)?;
    println!("Loaded deck with {} sections", sections.len());

    let mut state = PresentationState::new(sections);
    let mut navigator = Navigator::new(config.navigation.navigator_config());
    print_slide(&state);

    let (mut session, mut events) = CaptureSession::start(&config.relay_url).await?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("\nStopping...");
                break;
            }
            event = events.next() => {
                let Some(event) = event else {
                    tracing::info!("session ended");
                    break;
                };
                handle_event(event, &mut navigator, &mut state);
            }
        }
    }

    session.stop().await;
    Ok(())
}

/// Apply one relay event to the presentation
fn handle_event(event: RelayEvent, navigator: &mut Navigator, state: &mut PresentationState) {
    match event {
        RelayEvent::Turn {
            transcript,
            end_of_turn,
        } => match navigator.handle_turn(state, &transcript, end_of_turn) {
            NavOutcome::Advanced { token, .. } => {
                println!("\n[trigger: {token}]");
                print_slide(state);
            }
            NavOutcome::WentBack { .. } => {
                println!("\n[back]");
                print_slide(state);
            }
            NavOutcome::Question(text) => {
                println!("\n[question] {text}");
            }
            NavOutcome::Preview | NavOutcome::NoChange => {}
        },
        RelayEvent::Status { ready, message } => {
            tracing::info!(ready, message = message.as_deref().unwrap_or(""), "relay status");
            if ready {
                println!("Listening - speak to navigate");
            }
        }
        RelayEvent::Begin => tracing::debug!("upstream session began"),
        RelayEvent::Error { message } => tracing::warn!(message, "upstream error"),
        RelayEvent::Termination => tracing::info!("upstream session terminated"),
        RelayEvent::Ping | RelayEvent::Pong => {}
    }
}

/// Print the current slide
fn print_slide(state: &PresentationState) {
    if let Some(section) = state.current_section() {
        println!(
            "--- Slide {}/{} ---",
            state.current_index() + 1,
            state.len()
        );
        println!("{}", section.content);
        println!("(triggers: {})", section.active_triggers().join(", "));
    }
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64, dump: Option<&std::path::Path>) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let (frame_tx, mut frame_rx) = tokio::sync::mpsc::channel(64);
    let mut capture = AudioCapture::new()?;
    capture.start(frame_tx)?;

    let sample_rate = capture.sample_rate();
    println!("Sample rate: {sample_rate} Hz");
    println!("---");

    let mut all_samples: Vec<i16> = Vec::new();

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let mut second: Vec<i16> = Vec::new();
        while let Ok(frame) = frame_rx.try_recv() {
            second.extend_from_slice(frame.samples());
        }

        let energy = calculate_rms(&second);
        let peak = second
            .iter()
            .map(|s| f32::from(*s).abs() / 32768.0)
            .fold(0.0f32, f32::max);

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:2}s] RMS: {:.4} | Peak: {:.4} | [{}]",
            i + 1,
            energy,
            peak,
            meter
        );

        if dump.is_some() {
            all_samples.extend_from_slice(&second);
        }
    }

    capture.stop();

    if let Some(path) = dump {
        let wav = samples_to_wav(&all_samples, sample_rate)?;
        std::fs::write(path, wav)?;
        println!("\nWrote {} samples to {}", all_samples.len(), path.display());
    }

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: pactl info | grep 'Default Source'");
    println!("  3. Run: arecord -l (to list devices)");

    Ok(())
}

/// Calculate RMS energy of PCM16 samples, normalized to [0, 1]
#[allow(clippy::cast_precision_loss)]
fn calculate_rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples
        .iter()
        .map(|s| {
            let normalized = f32::from(*s) / 32768.0;
            normalized * normalized
        })
        .sum();
    (sum_squares / samples.len() as f32).sqrt()
}
