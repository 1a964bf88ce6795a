use anyhow::Result;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use uuid::Uuid;

use chatbuff::audio::{AudioPayload, CaptureSession, MicrophoneSource, POLL_INTERVAL_MS};
use chatbuff::kernel::{CaptureSignal, ConnectionStatus, Event, InputEvent, ServerEvent, SessionView};
use chatbuff::services::backend::BackendClient;
use chatbuff::services::channel::LiveChannel;
use chatbuff::services::delivery::{FallbackPolicy, ReliableSender};
use chatbuff::transcript::Speaker;
use chatbuff::tree::NodeId;
use chatbuff::{SessionConfig, SessionController};

const HELP: &str = "\
commands:
  /say <text>            you said something (typed)
  /hear <text>           the other side said something (typed)
  /rec                   start recording the microphone
  /stop                  stop recording and transcribe
  /open <node>           click a mind-map node (e.g. /open n1)
  /branch <node> <text>  add your own branch under a node
  /seed                  restart the mind map from their last line
  /connect               re-open the live channel
  /reset [root]          restart the mind map
  /clear [history|transcript]
  /show                  print the session
  /json                  dump the session as JSON
  /quit";

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 1. Setup Logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chatbuff=info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = SessionConfig::from_env();
    let client_id = Uuid::new_v4();
    info!("ChatBuff session {} -> {}", client_id, config.backend_url);

    // 2. Transports
    let backend = Arc::new(BackendClient::new(&config.backend_url, config.request_timeout));
    let channel = Arc::new(LiveChannel::new(&config.ws_url, client_id));
    let sender = Arc::new(ReliableSender::new(channel.clone(), backend, config.fallback));

    // 3. Controller + Channels
    let (tx, rx) = mpsc::channel(config.event_capacity);
    let mut controller = SessionController::new(client_id);
    let (views_tx, views) = watch::channel(controller.view());

    forward_server_events(channel.subscribe(), tx.clone());
    forward_status(channel.status(), tx.clone());

    if config.fallback == FallbackPolicy::PreferLive {
        if let Err(e) = channel.connect().await {
            warn!("Live channel unavailable, continuing over HTTP: {}", e);
        }
    }

    let controller_task = {
        let tx = tx.clone();
        let sender = sender.clone();
        tokio::spawn(async move { controller.run(rx, tx, sender, views_tx).await })
    };

    // 4. Capture (stays on this task; the cpal stream is not Send everywhere)
    let mut capture = CaptureSession::new(MicrophoneSource::new(), config.capture.clone());
    let mut cadence = interval(Duration::from_millis(POLL_INTERVAL_MS));
    cadence.set_missed_tick_behavior(MissedTickBehavior::Skip);

    println!("{}", HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = cadence.tick() => {
                if capture.is_recording() {
                    capture.poll();
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                let (cmd, rest) = line.split_once(' ').unwrap_or((line, ""));
                let rest = rest.trim();

                match cmd {
                    "" => {}
                    "/say" => tx.send(Event::Input(InputEvent::say(rest, Speaker::User))).await?,
                    "/hear" => tx.send(Event::Input(InputEvent::say(rest, Speaker::Other))).await?,
                    "/rec" => match capture.start() {
                        Ok(()) => tx.send(Event::Capture(CaptureSignal::Started)).await?,
                        Err(e) => tx.send(Event::Failure(e)).await?,
                    },
                    "/stop" if !capture.is_recording() => println!("not recording"),
                    "/stop" => match capture.stop() {
                        Ok(Some(payload)) => {
                            let submitted = Some(payload.bytes.len());
                            tx.send(Event::Capture(CaptureSignal::Stopped { submitted })).await?;
                            deliver_audio(payload, sender.clone(), tx.clone());
                        }
                        Ok(None) => tx.send(Event::Capture(CaptureSignal::Stopped { submitted: None })).await?,
                        Err(e) => {
                            tx.send(Event::Capture(CaptureSignal::Stopped { submitted: None })).await?;
                            tx.send(Event::Failure(e)).await?;
                        }
                    },
                    "/open" => match rest.parse::<NodeId>() {
                        Ok(id) => tx.send(Event::activate(id)).await?,
                        Err(_) => println!("usage: /open <node>"),
                    },
                    "/branch" => {
                        let (node, content) = rest.split_once(' ').unwrap_or((rest, ""));
                        match node.parse::<NodeId>() {
                            Ok(parent) => {
                                let content = content.to_string();
                                tx.send(Event::Input(InputEvent::Branch { parent, content })).await?
                            }
                            Err(_) => println!("usage: /branch <node> <text>"),
                        }
                    }
                    "/connect" => {
                        if let Err(e) = channel.connect().await {
                            tx.send(Event::Failure(e)).await?
                        }
                    }
                    "/seed" => tx.send(Event::Input(InputEvent::SeedFromTranscript)).await?,
                    "/reset" => tx.send(Event::Input(InputEvent::ResetTree(rest.to_string()))).await?,
                    "/clear" => {
                        let input = match rest {
                            "transcript" => InputEvent::ClearTranscript,
                            _ => InputEvent::ClearHistory,
                        };
                        tx.send(Event::Input(input)).await?
                    }
                    "/show" => print_view(&views.borrow()),
                    "/json" => println!("{}", serde_json::to_string_pretty(&*views.borrow())?),
                    "/quit" => break,
                    _ => println!("{}", HELP),
                }
            }
        }
    }

    // 5. Teardown
    // A recording in progress is still submitted, and waited for.
    if capture.is_recording() {
        match capture.stop() {
            Ok(Some(payload)) => match sender.submit_recording(&payload).await {
                None => info!("Final recording sent over the live channel"),
                Some(Event::Failure(e)) => warn!("Final recording was not delivered: {}", e),
                Some(Event::Server(ServerEvent::Transcript(t))) => info!("Final recording transcribed: {}", t.text),
                Some(_) => {}
            },
            Ok(None) => {}
            Err(e) => warn!("Capture stop on exit failed: {}", e),
        }
    }
    channel.close();
    controller_task.abort();
    info!("Session {} ended", client_id);
    Ok(())
}

fn print_view(view: &SessionView) {
    println!("{}", view);
}

/// Hands a finished recording to the sender. A unary delivery answers with
/// the transcript directly, so it is fed back as if the server pushed it.
fn deliver_audio(payload: AudioPayload, sender: Arc<ReliableSender>, tx: mpsc::Sender<Event>) {
    tokio::spawn(async move {
        if let Some(event) = sender.submit_recording(&payload).await {
            let _ = tx.send(event).await;
        }
    });
}

fn forward_server_events(mut events: broadcast::Receiver<ServerEvent>, tx: mpsc::Sender<Event>) {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if tx.send(Event::Server(event)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => warn!("Controller lagged, {} server events skipped", n),
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

fn forward_status(mut status: watch::Receiver<ConnectionStatus>, tx: mpsc::Sender<Event>) {
    tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let current = *status.borrow_and_update();
            if tx.send(Event::Connection(current)).await.is_err() {
                break;
            }
        }
    });
}
