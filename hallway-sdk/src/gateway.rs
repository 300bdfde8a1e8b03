//! Gateway session: the inbound event stream.
//!
//! Connects to the platform's real-time gateway over websocket, performs
//! the identify/heartbeat handshake, and decodes dispatch frames into
//! [`GatewayEvent`]s delivered on an mpsc channel.
//!
//! The session does not reconnect on its own. Consumers should drive
//! reconnection with exponential backoff (e.g. 2→4→8→16→30s cap) after
//! [`GatewayEvent::Disconnected`].

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, ensure};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::event::GatewayEvent;
use crate::model::{ChannelId, GuildId, UserId};

/// Gateway intent bits, requested at identify time.
pub mod intents {
    pub const GUILD_VOICE_STATES: u64 = 1 << 7;
    pub const GUILD_MESSAGES: u64 = 1 << 9;
}

const OP_DISPATCH: u8 = 0;
const OP_HEARTBEAT: u8 = 1;
const OP_IDENTIFY: u8 = 2;
const OP_HELLO: u8 = 10;
const OP_HEARTBEAT_ACK: u8 = 11;

/// Configuration for a gateway session.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Websocket URL of the gateway.
    pub url: String,
    /// Platform credential.
    pub token: String,
    /// Intent bits (see [`intents`]).
    pub intents: u64,
}

/// Handle to a running gateway session.
#[derive(Clone)]
pub struct GatewayHandle {
    shutdown: mpsc::Sender<()>,
}

impl GatewayHandle {
    /// Tear the session down. The event stream ends with
    /// [`GatewayEvent::Disconnected`].
    pub async fn close(&self) {
        let _ = self.shutdown.send(()).await;
    }
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connect and start a session. Events arrive on the returned receiver
/// until the connection drops or [`GatewayHandle::close`] is called.
pub async fn connect(config: GatewayConfig) -> Result<(GatewayHandle, mpsc::Receiver<GatewayEvent>)> {
    let (ws, _) = tokio_tungstenite::connect_async(config.url.as_str())
        .await
        .context("gateway connect failed")?;

    let (event_tx, event_rx) = mpsc::channel(256);
    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

    tokio::spawn(async move {
        let reason = match session(ws, &config, &event_tx, shutdown_rx).await {
            Ok(reason) => reason,
            Err(e) => e.to_string(),
        };
        let _ = event_tx.send(GatewayEvent::Disconnected { reason }).await;
    });

    Ok((GatewayHandle { shutdown: shutdown_tx }, event_rx))
}

#[derive(Debug, Deserialize)]
struct Frame {
    op: u8,
    #[serde(default)]
    s: Option<u64>,
    #[serde(default)]
    t: Option<String>,
    #[serde(default)]
    d: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct Hello {
    /// Heartbeat cadence in milliseconds.
    heartbeat_interval: u64,
}

async fn session(
    ws: WsStream,
    config: &GatewayConfig,
    events: &mpsc::Sender<GatewayEvent>,
    mut shutdown: mpsc::Receiver<()>,
) -> Result<String> {
    let (mut sink, mut stream) = ws.split();

    // HELLO comes first: it carries the heartbeat cadence.
    let hello = next_frame(&mut stream)
        .await?
        .ok_or_else(|| anyhow!("gateway closed before HELLO"))?;
    ensure!(hello.op == OP_HELLO, "expected HELLO, got op {}", hello.op);
    let hello: Hello = serde_json::from_value(hello.d).context("malformed HELLO")?;

    send_frame(
        &mut sink,
        OP_IDENTIFY,
        serde_json::json!({
            "token": config.token,
            "intents": config.intents,
        }),
    )
    .await?;

    let mut heartbeat = tokio::time::interval(Duration::from_millis(hello.heartbeat_interval));
    heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut seq: Option<u64> = None;
    let mut voice = VoiceCache::new();

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                send_frame(&mut sink, OP_HEARTBEAT, serde_json::json!(seq)).await?;
            }
            _ = shutdown.recv() => {
                let _ = sink.send(Message::Close(None)).await;
                return Ok("shutdown requested".to_string());
            }
            frame = next_frame(&mut stream) => {
                let Some(frame) = frame? else {
                    return Ok("connection closed".to_string());
                };
                if let Some(s) = frame.s {
                    seq = Some(s);
                }
                match frame.op {
                    OP_DISPATCH => {
                        let Some(name) = frame.t.as_deref() else { continue };
                        if let Some(event) = decode_dispatch(name, frame.d, &mut voice) {
                            if events.send(event).await.is_err() {
                                return Ok("consumer dropped".to_string());
                            }
                        }
                    }
                    // Server-requested heartbeat: answer immediately.
                    OP_HEARTBEAT => {
                        send_frame(&mut sink, OP_HEARTBEAT, serde_json::json!(seq)).await?;
                    }
                    OP_HEARTBEAT_ACK => {}
                    other => tracing::debug!(op = other, "Unhandled gateway op"),
                }
            }
        }
    }
}

/// Read frames until a decodable text frame or the end of the stream.
async fn next_frame<S>(stream: &mut S) -> Result<Option<Frame>>
where
    S: Stream<Item = tokio_tungstenite::tungstenite::Result<Message>> + Unpin,
{
    while let Some(msg) = stream.next().await {
        match msg.context("gateway read failed")? {
            Message::Text(text) => {
                return serde_json::from_str(text.as_str())
                    .context("malformed gateway frame")
                    .map(Some);
            }
            Message::Close(frame) => {
                let reason = frame.map(|f| f.reason.to_string()).unwrap_or_default();
                tracing::debug!(reason = %reason, "Gateway sent close");
                return Ok(None);
            }
            // Pings are answered by the transport; everything else is noise.
            _ => {}
        }
    }
    Ok(None)
}

async fn send_frame<S>(sink: &mut S, op: u8, d: serde_json::Value) -> Result<()>
where
    S: Sink<Message> + Unpin,
    S::Error: std::error::Error + Send + Sync + 'static,
{
    let frame = serde_json::json!({ "op": op, "d": d });
    sink.send(Message::text(frame.to_string()))
        .await
        .context("gateway send failed")
}

/// Who is in which voice channel, per session. Voice-state frames only
/// carry the new channel; the cache supplies the previous one.
type VoiceCache = HashMap<(GuildId, UserId), ChannelId>;

#[derive(Debug, Deserialize)]
struct WireUser {
    id: UserId,
}

#[derive(Debug, Deserialize)]
struct ReadyPayload {
    user: WireUser,
}

#[derive(Debug, Deserialize)]
struct VoiceStatePayload {
    guild_id: GuildId,
    user_id: UserId,
    display_name: String,
    channel_id: Option<ChannelId>,
}

#[derive(Debug, Deserialize)]
struct WireAuthor {
    id: UserId,
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct MessagePayload {
    guild_id: GuildId,
    channel_id: ChannelId,
    author: WireAuthor,
    content: String,
}

fn decode_dispatch(
    name: &str,
    d: serde_json::Value,
    voice: &mut VoiceCache,
) -> Option<GatewayEvent> {
    match name {
        "READY" => {
            let payload: ReadyPayload = parse(name, d)?;
            Some(GatewayEvent::Ready {
                bot_user: payload.user.id,
            })
        }
        "VOICE_STATE_UPDATE" => {
            let payload: VoiceStatePayload = parse(name, d)?;
            let key = (payload.guild_id, payload.user_id);
            let previous = match payload.channel_id {
                Some(channel) => voice.insert(key, channel),
                None => voice.remove(&key),
            };
            Some(GatewayEvent::VoiceStateUpdate {
                guild_id: payload.guild_id,
                user_id: payload.user_id,
                display_name: payload.display_name,
                previous,
                next: payload.channel_id,
            })
        }
        "MESSAGE_CREATE" => {
            let payload: MessagePayload = parse(name, d)?;
            Some(GatewayEvent::MessageCreate {
                guild_id: payload.guild_id,
                channel_id: payload.channel_id,
                author_id: payload.author.id,
                author_display_name: payload.author.display_name,
                content: payload.content,
            })
        }
        _ => None,
    }
}

fn parse<T: serde::de::DeserializeOwned>(name: &str, d: serde_json::Value) -> Option<T> {
    match serde_json::from_value(d) {
        Ok(payload) => Some(payload),
        Err(e) => {
            tracing::warn!(event = name, error = %e, "Undecodable dispatch payload");
            None
        }
    }
}
