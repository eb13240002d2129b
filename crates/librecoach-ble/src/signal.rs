//! Line-oriented toggle transport.
//!
//! Each line read is one delivery of the retained toggle. The lines come
//! from standard input (e.g. piped from `mosquitto_sub`) or from a
//! subscriber command the daemon spawns itself.

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use librecoach_core::{CoreError, Payload, SignalSource};

const CHANNEL_SIZE: usize = 32;

#[derive(Debug, Clone)]
pub enum LineInput {
    Stdin,
    /// Program and arguments; `{topic}` and `{qos}` are substituted.
    Command(Vec<String>),
}

/// [`SignalSource`] reading one payload per line.
#[derive(Debug)]
pub struct LineSignalSource {
    input: LineInput,
    subscribed: AtomicBool,
}

impl LineSignalSource {
    pub fn new(input: LineInput) -> Self {
        Self {
            input,
            subscribed: AtomicBool::new(false),
        }
    }
}

/// Substitute `{topic}` and `{qos}` in each argument.
pub fn render_command(argv: &[String], topic: &str, qos: u8) -> Vec<String> {
    argv.iter()
        .map(|arg| {
            arg.replace("{topic}", topic)
                .replace("{qos}", &qos.to_string())
        })
        .collect()
}

/// Empty lines are deliveries without a value.
fn line_payload(line: &str) -> Payload {
    if line.is_empty() {
        Payload::Missing
    } else {
        Payload::from(line)
    }
}

async fn forward_lines<R>(reader: R, tx: mpsc::Sender<Payload>) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        if tx.send(line_payload(&line)).await.is_err() {
            break;
        }
    }
    Ok(())
}

fn subscription_error(topic: &str, message: impl Into<String>) -> CoreError {
    CoreError::Subscription {
        topic: topic.to_owned(),
        message: message.into(),
    }
}

fn spawn_subscriber(argv: &[String], topic: &str) -> Result<Child, CoreError> {
    let Some((program, args)) = argv.split_first() else {
        return Err(subscription_error(topic, "empty subscriber command"));
    };
    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| subscription_error(topic, format!("cannot launch {program}: {e}")))
}

#[async_trait]
impl SignalSource for LineSignalSource {
    async fn subscribe(&self, topic: &str, qos: u8) -> Result<mpsc::Receiver<Payload>, CoreError> {
        if self.subscribed.swap(true, Ordering::SeqCst) {
            return Err(subscription_error(topic, "line input can only be read once"));
        }

        let (tx, rx) = mpsc::channel(CHANNEL_SIZE);
        match &self.input {
            LineInput::Stdin => {
                info!(topic, "reading toggle payloads from stdin");
                tokio::spawn(async move {
                    if let Err(e) = forward_lines(BufReader::new(tokio::io::stdin()), tx).await {
                        warn!(error = %e, "stdin read failed");
                    }
                    debug!("stdin closed");
                });
            }
            LineInput::Command(argv) => {
                let argv = render_command(argv, topic, qos);
                let mut child = spawn_subscriber(&argv, topic)?;
                let stdout = child
                    .stdout
                    .take()
                    .ok_or_else(|| subscription_error(topic, "subscriber stdout not captured"))?;
                info!(topic, qos, program = %argv[0], "subscriber command started");
                tokio::spawn(async move {
                    if let Err(e) = forward_lines(BufReader::new(stdout), tx).await {
                        warn!(error = %e, "subscriber output read failed");
                    }
                    match child.wait().await {
                        Ok(status) => debug!(%status, "subscriber command exited"),
                        Err(e) => warn!(error = %e, "subscriber command wait failed"),
                    }
                });
            }
        }
        Ok(rx)
    }
}
