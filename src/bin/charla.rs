//! Terminal chat view for the charla tutor client.
//!
//! A thin line-oriented front end over the library: plain lines are sent to
//! the tutor, slash commands control the session and the playback slot.
//! All tracing output goes to stderr so stdout stays a clean conversation
//! transcript.

use anyhow::Context;
use charla::{
    AudioOutput, AutoplayPolicy, BackendClient, ChatSession, ClientConfig, CpalOutput, Message,
    PlaybackController, Sender, SessionState,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncBufReadExt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    run().await
}

async fn run() -> anyhow::Result<()> {
    let config = ClientConfig::load_or_default().context("failed to load configuration")?;

    let backend =
        Arc::new(BackendClient::new(&config.backend.base_url).context("failed to build client")?);
    let output: Arc<dyn AudioOutput> = Arc::new(CpalOutput::new(&config.audio));
    let controller = PlaybackController::new(Arc::clone(&backend), output);
    let mut autoplay = AutoplayPolicy::new(Duration::from_millis(config.autoplay.delay_ms));
    let mut session = ChatSession::new(Arc::clone(&backend));

    // Log server-confirmed auth transitions as they happen.
    let mut auth = backend.auth_changes();
    tokio::spawn(async move {
        while auth.changed().await.is_ok() {
            tracing::info!(state = ?*auth.borrow(), "auth state changed");
        }
    });

    println!("charla — connecting to {}", config.backend.base_url);
    session.initialize().await;
    let mut printed = print_timeline(&session, 0);

    match session.state() {
        SessionState::Uninitialized => {
            println!("You are not logged in. Sign in through the web app, then start charla again.");
            return Ok(());
        }
        SessionState::Failed => {
            println!("(type /reset to try again, /quit to exit)");
        }
        _ => {
            println!("(type a message, or /reset /play <n> /stop /devices /logout /quit)");
        }
    }

    let speak = config.audio.enabled && config.autoplay.enabled;
    if speak && let Some(profile) = session.profile().cloned() {
        autoplay
            .observe(session.timeline(), &profile, &controller)
            .await;
    }

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_owned();
        match line.as_str() {
            "" => continue,
            "/quit" => break,
            "/stop" => {
                controller.stop_playback();
                continue;
            }
            "/devices" => {
                match CpalOutput::list_output_devices() {
                    Ok(names) if names.is_empty() => println!("(no output devices found)"),
                    Ok(names) => {
                        for name in names {
                            println!("  {name}");
                        }
                    }
                    Err(e) => println!("(cannot list devices: {e})"),
                }
                continue;
            }
            "/reset" => {
                session.reset(&controller, &mut autoplay).await;
                printed = print_timeline(&session, 0);
            }
            "/logout" => {
                if let Err(e) = backend.logout().await {
                    println!("logout failed: {e}");
                } else {
                    println!("logged out.");
                }
                break;
            }
            _ if line.starts_with("/play") => {
                play_command(&line, &session, &controller);
                continue;
            }
            _ => {
                if !session.send_user_message(&line).await {
                    println!("(message not sent — session is not ready)");
                    continue;
                }
                printed = print_timeline(&session, printed);
            }
        }

        if speak && let Some(profile) = session.profile().cloned() {
            autoplay
                .observe(session.timeline(), &profile, &controller)
                .await;
        }
    }

    // No audio may outlive the chat.
    controller.teardown();
    Ok(())
}

/// Print timeline entries from `from` onward; returns the new high-water mark.
fn print_timeline(session: &ChatSession, from: usize) -> usize {
    let timeline = session.timeline();
    for (index, message) in timeline.iter().enumerate().skip(from) {
        print_message(index + 1, message);
    }
    timeline.len()
}

fn print_message(number: usize, message: &Message) {
    let who = match message.sender {
        Sender::User => "you",
        Sender::Bot => "tutor",
    };
    println!("[{number}] {who}: {}", message.text);
}

/// `/play <n>` speaks the n-th printed message; `/play` alone speaks the
/// latest tutor message. Pressing it again for the same message stops it.
fn play_command(line: &str, session: &ChatSession, controller: &PlaybackController) {
    let Some(profile) = session.profile() else {
        println!("(no profile yet — initialize the session first)");
        return;
    };

    match play_target(line, session.timeline()) {
        Ok(message) => {
            controller.request_playback(message.id, &message.text, message.sender, profile, false);
        }
        Err(hint) => println!("{hint}"),
    }
}

/// Resolve a `/play` line to a timeline entry, or a hint for the user.
fn play_target<'a>(line: &str, timeline: &'a [Message]) -> Result<&'a Message, String> {
    if timeline.is_empty() {
        return Err("(nothing to play yet)".to_owned());
    }
    match line.split_whitespace().nth(1) {
        Some(arg) => match arg.parse::<usize>() {
            Ok(n) if n >= 1 && n <= timeline.len() => Ok(&timeline[n - 1]),
            _ => Err(format!("(usage: /play <1..{}>)", timeline.len())),
        },
        None => timeline
            .iter()
            .rev()
            .find(|m| m.sender == Sender::Bot)
            .ok_or_else(|| "(nothing to play yet)".to_owned()),
    }
}
