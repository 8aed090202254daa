//! Parley Chat - terminal client
//!
//! Lines typed on stdin are sent as chat messages. Commands:
//!   /rec           start or stop a microphone recording (microphone builds)
//!   /voice <file>  send a file as a voice clip
//!   /users         show who is online
//!   /quit          leave the room

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use parley_broadcaster::ChatEvent;
use parley_client::{save_clip, ChatClient, ClientError, ClientEvent};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "parley-chat", version, about = "Terminal client for Parley chat")]
struct Args {
    /// Server URL
    #[arg(long, default_value = "ws://127.0.0.1:5002")]
    url: String,

    /// Name to join with (prompted if omitted)
    #[arg(short, long)]
    username: Option<String>,

    /// Save received voice clips into this directory
    #[arg(long)]
    voice_dir: Option<PathBuf>,

    /// Input device index for /rec (default device if omitted)
    #[cfg(feature = "microphone")]
    #[arg(long)]
    device: Option<usize>,

    /// List input devices and exit
    #[cfg(feature = "microphone")]
    #[arg(long)]
    list_devices: bool,
}

#[cfg(feature = "microphone")]
type Recorder = parley_audio::VoiceRecorder<parley_audio::CpalMicrophone, ChatClient>;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let args = Args::parse();

    #[cfg(feature = "microphone")]
    if args.list_devices {
        for device in parley_audio::list_input_devices()? {
            let marker = if device.is_default { " [DEFAULT]" } else { "" };
            println!(
                "{:3}: {}{} ({} ch, {} Hz)",
                device.index,
                device.name,
                marker,
                device.max_input_channels,
                device.default_sample_rate
            );
        }
        return Ok(());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let (client, mut events) = ChatClient::connect(&args.url)
        .await
        .with_context(|| format!("Failed to connect to {}", args.url))?;

    let mut username = args.username.clone();
    loop {
        let name = match username.take() {
            Some(name) => name,
            None => {
                println!("Username:");
                match lines.next_line().await? {
                    Some(line) => line,
                    None => return Ok(()),
                }
            }
        };
        match client.join(&name).await {
            Ok(()) => break,
            Err(ClientError::EmptyUsername) => println!("Username must not be blank"),
            Err(e) => return Err(e).context("Failed to join"),
        }
    }
    let me = client.username().unwrap_or_default();
    println!("Joined as {}. Type /quit to leave.", me);

    #[cfg(feature = "microphone")]
    let recorder = {
        let config = parley_audio::AudioConfig {
            device_index: args.device,
            ..Default::default()
        };
        Recorder::new(
            parley_audio::CpalMicrophone::new(&config),
            client.clone(),
            &config,
        )
    };

    let mut roster: Vec<String> = Vec::new();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                if line == "/quit" {
                    break;
                } else if line == "/users" {
                    println!("👥 Online ({}): {}", roster.len(), roster.join(", "));
                } else if line == "/rec" {
                    #[cfg(feature = "microphone")]
                    toggle_recording(&recorder).await;
                    #[cfg(not(feature = "microphone"))]
                    println!("⚠️  Built without microphone support");
                } else if let Some(path) = line.strip_prefix("/voice ") {
                    send_voice_file(&client, path.trim()).await;
                } else if line.starts_with('/') {
                    println!("⚠️  Unknown command: {}", line);
                } else {
                    match client.send_message(line).await {
                        // Own text is not echoed back by default; show it locally.
                        Ok(()) => println!("[{}] {}: {}", Local::now().format("%H:%M:%S"), me, line),
                        Err(e) => println!("⚠️  {}", e),
                    }
                }
            }
            event = events.recv() => {
                let Some(event) = event else {
                    break;
                };
                match event {
                    ClientEvent::ConnectionLost => {
                        println!("❌ Connection to server lost");
                        return Ok(());
                    }
                    ClientEvent::Roster(users) => {
                        println!("👥 Online ({}): {}", users.len(), users.join(", "));
                        roster = users;
                    }
                    ClientEvent::History(history) => {
                        for event in &history {
                            print_event(event);
                        }
                    }
                    ClientEvent::Chat(event) => print_event(&event),
                    ClientEvent::Voice(event) => {
                        print_event(&event);
                        if let Some(dir) = &args.voice_dir {
                            match save_clip(dir, &event).await {
                                Ok(Some(path)) => println!("   saved to {}", path.display()),
                                Ok(None) => {}
                                Err(e) => println!("⚠️  Failed to save voice clip: {}", e),
                            }
                        }
                    }
                    ClientEvent::Rejected(message) => println!("⚠️  Server: {}", message),
                }
            }
        }
    }

    #[cfg(feature = "microphone")]
    if recorder.is_recording() {
        toggle_recording(&recorder).await;
    }

    client.close().await;
    println!("👋 Bye");
    Ok(())
}

fn print_event(event: &ChatEvent) {
    let time = event.timestamp().with_timezone(&Local).format("%H:%M:%S");
    match event {
        ChatEvent::System { message, .. } => println!("*** {}", message),
        ChatEvent::Text {
            username, message, ..
        } => println!("[{}] {}: {}", time, username, message),
        ChatEvent::Voice {
            username, audio, ..
        } => println!("[{}] {}: 🎤 voice clip ({} bytes)", time, username, audio.len()),
    }
}

async fn send_voice_file(client: &ChatClient, path: &str) {
    let audio = match tokio::fs::read(path).await {
        Ok(audio) => audio,
        Err(e) => {
            println!("⚠️  Cannot read {}: {}", path, e);
            return;
        }
    };
    match client.send_voice(audio).await {
        Ok(()) => println!("🎤 Voice clip sent"),
        Err(e) => println!("⚠️  {}", e),
    }
}

#[cfg(feature = "microphone")]
async fn toggle_recording(recorder: &Recorder) {
    use parley_audio::{StartOutcome, StopOutcome};

    if recorder.state() == parley_audio::RecorderState::Idle {
        match recorder.start().await {
            Ok(StartOutcome::Started) => println!("🔴 Recording... type /rec again to send"),
            Ok(StartOutcome::AlreadyActive) => {}
            Ok(StartOutcome::Cancelled) => println!("Recording cancelled"),
            Err(e) => println!("⚠️  {}", e),
        }
    } else {
        match recorder.stop().await {
            Ok(StopOutcome::Sent { bytes }) => println!("🎤 Voice clip sent ({} bytes)", bytes),
            Ok(StopOutcome::Empty) => println!("No audio recorded"),
            Ok(StopOutcome::Cancelled | StopOutcome::NotRecording) => {}
            Err(e) => println!("⚠️  {}", e),
        }
    }
}
