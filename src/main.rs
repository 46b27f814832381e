//! voxlink demo binary
//!
//! Dials the agent endpoint from `VOXLINK_URL`, streams the default
//! microphone, and plays agent speech on the default output. Lines typed
//! on stdin go out as text messages. Ctrl-C (or the agent hanging up)
//! ends the session; there is no automatic reconnect.

use anyhow::Context;
use serde_json::json;
use tokio::io::AsyncBufReadExt;
use voxlink::device::{PulseSink, PulseSource};
use voxlink::runner::SessionHandle;
use voxlink::session::SessionOutput;
use voxlink::SessionConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let url = std::env::var("VOXLINK_URL")
        .context("VOXLINK_URL must point at the voice agent websocket")?;
    let prompt = std::env::var("VOXLINK_PROMPT")
        .unwrap_or_else(|_| "You are a helpful receptionist.".to_string());

    let config = SessionConfig {
        url,
        setup: json!({ "system_prompt": prompt }),
        ..Default::default()
    };

    let source = PulseSource::new("voxlink", config.sample_rate)?;
    let sink = PulseSink::new("voxlink", config.sample_rate)?;
    let (handle, mut notices) = SessionHandle::spawn(config, Box::new(source), Box::new(sink));

    let mut stdin = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
            line = stdin.next_line() => {
                if let Ok(Some(line)) = line {
                    if !line.trim().is_empty() {
                        handle.send_text(line);
                    }
                }
            }
            notice = notices.recv() => match notice {
                Some(SessionOutput::AgentText(text)) => println!("agent: {text}"),
                Some(SessionOutput::UserTranscript(text)) => println!("you: {text}"),
                Some(SessionOutput::Ended(reason)) => {
                    if let Some(reason) = reason {
                        eprintln!("session ended: {reason}");
                    }
                    break;
                }
                Some(_) => {}
                None => break,
            },
        }
    }

    handle.stop().await
}
