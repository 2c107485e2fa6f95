//! Per-user notification channel to the browser.
//!
//! Each connected user owns exactly one [`Broker`]. Brokers queue frames on
//! an unbounded channel drained by the connection task, which is the only
//! writer of the socket.

pub mod socket;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures::{Sink, SinkExt, Stream, StreamExt};
use html_escape::{encode_double_quoted_attribute, encode_text};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::time::{interval_at, sleep, Instant};
use tokio_util::sync::CancellationToken;

use crate::error::{RecipyaError, Result};

/// Interval between application pings.
pub const PING_PERIOD: Duration = Duration::from_secs(30);

/// How long a connection may stay silent before it is dropped.
pub const READ_DEADLINE: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Toast,
    File,
    Progress,
}

/// Frame sent to the client, dispatched on `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(rename = "fileName", default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    pub data: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Toast<'a> {
    message: &'a str,
    background: &'a str,
}

/// Transport-neutral socket frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Text(String),
    Ping,
    Pong,
    Close,
}

/// HTML fragment swapped into the page's notification area.
pub fn progress_fragment(title: &str, visible: bool, value: usize, total: usize) -> String {
    let hidden = if visible { "" } else { " hidden" };
    format!(
        r#"<div id="ws-notification-container" class="z-20 fixed bottom-0 right-0 p-6 cursor-default{hidden}"><div class="bg-blue-500 text-white px-4 py-2 rounded shadow-md"><p class="font-medium text-center pb-1">{}</p><progress max="{}" value="{}"></progress></div></div>"#,
        encode_text(title),
        encode_double_quoted_attribute(&total.to_string()),
        encode_double_quoted_attribute(&value.to_string()),
    )
}

pub struct Broker {
    user_id: i64,
    outbound: UnboundedSender<Frame>,
    cancel: CancellationToken,
}

impl Broker {
    fn new(user_id: i64) -> (Arc<Broker>, UnboundedReceiver<Frame>) {
        let (outbound, receiver) = unbounded_channel();
        let broker = Arc::new(Broker {
            user_id,
            outbound,
            cancel: CancellationToken::new(),
        });
        (broker, receiver)
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.outbound.is_closed()
    }

    /// Ask the connection task to shut down.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    fn send(&self, message: &Message) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(RecipyaError::NotConnected);
        }
        let text = serde_json::to_string(message)?;
        self.outbound
            .send(Frame::Text(text))
            .map_err(|_| RecipyaError::NotConnected)
    }

    pub fn send_file(&self, file_name: &str, data: &[u8]) -> Result<()> {
        self.send(&Message {
            kind: MessageType::File,
            file_name: Some(file_name.to_string()),
            data: STANDARD.encode(data),
        })
    }

    pub fn send_toast(&self, message: &str, background: &str) -> Result<()> {
        let data = serde_json::to_string(&Toast {
            message,
            background,
        })?;
        self.send(&Message {
            kind: MessageType::Toast,
            file_name: None,
            data,
        })
    }

    pub fn send_progress(&self, title: &str, value: usize, total: usize) -> Result<()> {
        self.send_progress_status(title, true, value, total)
    }

    pub fn send_progress_status(&self, title: &str, visible: bool, value: usize, total: usize) -> Result<()> {
        self.send(&Message {
            kind: MessageType::Progress,
            file_name: None,
            data: progress_fragment(title, visible, value, total),
        })
    }
}

/// Process-wide map of live brokers keyed by user id.
#[derive(Clone, Default)]
pub struct BrokerRegistry {
    brokers: Arc<RwLock<HashMap<i64, Arc<Broker>>>>,
}

impl BrokerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the broker of a new connection, closing any previous one.
    pub fn register(&self, user_id: i64) -> (Arc<Broker>, UnboundedReceiver<Frame>) {
        let (broker, receiver) = Broker::new(user_id);
        let previous = self
            .brokers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(user_id, Arc::clone(&broker));
        if let Some(previous) = previous {
            info!("User {} reconnected, closing previous connection", user_id);
            previous.close();
        }
        (broker, receiver)
    }

    /// Remove `broker` unless it has already been replaced.
    pub fn remove(&self, broker: &Arc<Broker>) {
        let mut brokers = self
            .brokers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if brokers
            .get(&broker.user_id)
            .is_some_and(|current| Arc::ptr_eq(current, broker))
        {
            brokers.remove(&broker.user_id);
        }
    }

    pub fn get(&self, user_id: i64) -> Option<Arc<Broker>> {
        self.brokers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&user_id)
            .cloned()
    }

    pub fn is_connected(&self, user_id: i64) -> bool {
        self.get(user_id).is_some()
    }

    fn with_broker(&self, user_id: i64, f: impl FnOnce(&Broker) -> Result<()>) -> Result<()> {
        match self.get(user_id) {
            Some(broker) => f(&broker),
            None => Err(RecipyaError::NotConnected),
        }
    }

    pub fn send_file(&self, user_id: i64, file_name: &str, data: &[u8]) -> Result<()> {
        self.with_broker(user_id, |b| b.send_file(file_name, data))
    }

    pub fn send_toast(&self, user_id: i64, message: &str, background: &str) -> Result<()> {
        self.with_broker(user_id, |b| b.send_toast(message, background))
    }

    pub fn send_progress(&self, user_id: i64, title: &str, value: usize, total: usize) -> Result<()> {
        self.with_broker(user_id, |b| b.send_progress(title, value, total))
    }

    pub fn send_progress_status(
        &self,
        user_id: i64,
        title: &str,
        visible: bool,
        value: usize,
        total: usize,
    ) -> Result<()> {
        self.with_broker(user_id, |b| b.send_progress_status(title, visible, value, total))
    }
}

/// Drive one connection until it fails, goes silent or is superseded.
///
/// Queued frames and periodic pings go out through `sink`; pings and pongs
/// read from `stream` push the read deadline back. On exit the broker leaves
/// the registry and the socket is closed.
pub async fn run_connection<Si, St, E>(
    registry: BrokerRegistry,
    broker: Arc<Broker>,
    mut outbound: UnboundedReceiver<Frame>,
    sink: Si,
    stream: St,
) where
    Si: Sink<Frame>,
    St: Stream<Item = std::result::Result<Frame, E>>,
    E: std::fmt::Display,
{
    let mut sink = std::pin::pin!(sink);
    let mut stream = std::pin::pin!(stream);
    let mut ping = interval_at(Instant::now() + PING_PERIOD, PING_PERIOD);
    let deadline = sleep(READ_DEADLINE);
    tokio::pin!(deadline);
    let user_id = broker.user_id;

    loop {
        tokio::select! {
            _ = broker.cancel.cancelled() => {
                debug!("Connection of user {} superseded", user_id);
                break;
            }
            _ = ping.tick() => {
                if sink.send(Frame::Ping).await.is_err() {
                    warn!("Ping to user {} failed", user_id);
                    break;
                }
            }
            frame = outbound.recv() => {
                let Some(frame) = frame else { break };
                if sink.send(frame).await.is_err() {
                    warn!("Write to user {} failed", user_id);
                    break;
                }
            }
            incoming = stream.next() => match incoming {
                Some(Ok(Frame::Ping | Frame::Pong)) => {
                    deadline.as_mut().reset(Instant::now() + READ_DEADLINE);
                }
                Some(Ok(Frame::Text(text))) => debug!("Ignoring message from user {}: {}", user_id, text),
                Some(Ok(Frame::Close)) | None => break,
                Some(Err(err)) => {
                    warn!("Read from user {} failed: {}", user_id, err);
                    break;
                }
            },
            _ = &mut deadline => {
                warn!("User {} timed out", user_id);
                break;
            }
        }
    }

    registry.remove(&broker);
    broker.close();
    let _ = sink.send(Frame::Close).await;
    let _ = sink.close().await;
    info!("Connection of user {} closed", user_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::mpsc;
    use scraper::{Html, Selector};
    use std::convert::Infallible;

    #[test]
    fn test_message_wire_format() {
        let message = Message {
            kind: MessageType::File,
            file_name: Some("recipes.zip".to_string()),
            data: STANDARD.encode(b"PK"),
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "file");
        assert_eq!(json["fileName"], "recipes.zip");
        assert_eq!(json["data"], "UEs=");

        let toast = Message {
            kind: MessageType::Toast,
            file_name: None,
            data: String::new(),
        };
        assert!(serde_json::to_value(&toast).unwrap().get("fileName").is_none());
    }

    #[test]
    fn test_progress_fragment() {
        let html = progress_fragment("Importing <recipes>", true, 3, 10);
        let document = Html::parse_fragment(&html);

        let title = Selector::parse("p").unwrap();
        let text: String = document.select(&title).next().unwrap().text().collect();
        assert_eq!(text, "Importing <recipes>");

        let progress = Selector::parse("progress").unwrap();
        let bar = document.select(&progress).next().unwrap();
        assert_eq!(bar.value().attr("value"), Some("3"));
        assert_eq!(bar.value().attr("max"), Some("10"));

        let container = Selector::parse("#ws-notification-container.hidden").unwrap();
        assert!(document.select(&container).next().is_none());
        let hidden = Html::parse_fragment(&progress_fragment("x", false, 0, 1));
        assert!(hidden.select(&container).next().is_some());
    }

    #[test]
    fn test_not_connected() {
        let registry = BrokerRegistry::new();
        assert!(matches!(
            registry.send_toast(1, "hi", "bg-blue-500"),
            Err(RecipyaError::NotConnected)
        ));
    }

    #[test]
    fn test_register_supersedes() {
        let registry = BrokerRegistry::new();
        let (first, _rx1) = registry.register(1);
        let (second, _rx2) = registry.register(1);

        assert!(first.is_closed());
        assert!(!second.is_closed());

        registry.remove(&first);
        assert!(registry.is_connected(1));
        registry.remove(&second);
        assert!(!registry.is_connected(1));
    }

    #[test]
    fn test_toast_is_queued() {
        let registry = BrokerRegistry::new();
        let (_broker, mut rx) = registry.register(5);

        registry.send_toast(5, "Saved", "bg-green-500").unwrap();

        let Ok(Frame::Text(text)) = rx.try_recv() else {
            panic!("expected a text frame");
        };
        let message: Message = serde_json::from_str(&text).unwrap();
        assert_eq!(message.kind, MessageType::Toast);
        let toast: serde_json::Value = serde_json::from_str(&message.data).unwrap();
        assert_eq!(toast["message"], "Saved");
        assert_eq!(toast["background"], "bg-green-500");
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_delivers_and_times_out() {
        let registry = BrokerRegistry::new();
        let (broker, rx) = registry.register(9);
        let (client_tx, mut client_rx) = mpsc::unbounded::<Frame>();
        let (_incoming_tx, incoming_rx) = mpsc::unbounded::<std::result::Result<Frame, Infallible>>();

        broker.send_progress("Exporting", 1, 2).unwrap();
        run_connection(registry.clone(), broker, rx, client_tx, incoming_rx).await;

        let frames: Vec<Frame> = client_rx.by_ref().collect().await;
        assert!(matches!(&frames[0], Frame::Text(text) if text.contains("\"progress\"")));
        assert!(frames.iter().any(|f| *f == Frame::Ping));
        assert_eq!(frames.last(), Some(&Frame::Close));
        assert!(!registry.is_connected(9));
    }
}
