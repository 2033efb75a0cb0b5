//! WebSocket transport
//!
//! Client side of the JSON pub/sub protocol in `transport::message`.
//! Responsibilities:
//! - open a session: connect, `login`, then `auth` with the returned token
//! - run a writer task that forwards queued frames to the socket
//! - run a reader task that resolves publish acknowledgements into
//!   `DeliveryReport`s and routes topic admin replies
//! - expose the result as a `BrokerClient` + `TopicAdmin`
//!
//! Records count as in flight from `send` until the broker acknowledges or
//! rejects them. `queue_capacity` bounds that number; beyond it `send` fails
//! with `QueueFull` until a flush drains the backlog.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::broker::{
    BrokerClient, DeliveryReport, DeliveryReportSender, DeliveryReports, FlushOutcome, Record,
    SendError, SendErrorKind, TopicAdmin, TopicSpec,
};
use crate::config::BrokerSettings;
use crate::transport::message::{ClientMessage, ServerMessage};
use crate::utils::{AdminError, LinepubError, Result};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long `close` waits for the broker to end the connection.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

pub(crate) fn encode(msg: &ClientMessage) -> Result<WsMessage> {
    Ok(WsMessage::Text(serde_json::to_string(msg)?.into()))
}

pub(crate) async fn send_frame<S>(sink: &mut S, msg: &ClientMessage) -> Result<()>
where
    S: Sink<WsMessage, Error = tungstenite::Error> + Unpin,
{
    sink.send(encode(msg)?).await?;
    Ok(())
}

/// Next protocol frame, skipping pings and binary frames. `None` once the
/// broker closes the connection.
pub(crate) async fn read_server_message<S>(stream: &mut S) -> Result<Option<ServerMessage>>
where
    S: Stream<Item = std::result::Result<WsMessage, tungstenite::Error>> + Unpin,
{
    while let Some(frame) = stream.next().await {
        match frame? {
            WsMessage::Text(text) => return Ok(Some(serde_json::from_str(text.as_str())?)),
            WsMessage::Close(_) => return Ok(None),
            _ => continue,
        }
    }
    Ok(None)
}

/// Connects and authenticates, bounded by `connect_timeout_ms`.
pub async fn open_session(settings: &BrokerSettings) -> Result<WsStream> {
    let timeout = settings.connect_timeout();
    match tokio::time::timeout(timeout, handshake(settings)).await {
        Ok(result) => result,
        Err(_) => Err(LinepubError::ConnectTimeout {
            url: settings.brokers.clone(),
            timeout,
        }),
    }
}

async fn handshake(settings: &BrokerSettings) -> Result<WsStream> {
    let url = settings.brokers.as_str();
    let (mut ws, _response) = connect_async(url)
        .await
        .map_err(|e| LinepubError::Connect {
            url: url.to_string(),
            source: Box::new(e),
        })?;

    let login = ClientMessage::Login {
        username: settings.username.clone(),
        password: settings.password.clone(),
    };
    send_frame(&mut ws, &login).await?;
    let token = match read_server_message(&mut ws).await? {
        Some(ServerMessage::LoginResponse { token }) => token,
        Some(ServerMessage::Error { message }) => return Err(LinepubError::Auth(message)),
        Some(other) => {
            return Err(LinepubError::Protocol(format!(
                "expected login_response, got {other:?}"
            )));
        }
        None => {
            return Err(LinepubError::Protocol(
                "connection closed during login".to_string(),
            ));
        }
    };

    send_frame(&mut ws, &ClientMessage::Auth { token }).await?;
    match read_server_message(&mut ws).await? {
        Some(ServerMessage::Authenticated {}) => {}
        Some(ServerMessage::Error { message }) => return Err(LinepubError::Auth(message)),
        Some(other) => {
            return Err(LinepubError::Protocol(format!(
                "expected authenticated, got {other:?}"
            )));
        }
        None => {
            return Err(LinepubError::Protocol(
                "connection closed during auth".to_string(),
            ));
        }
    }

    debug!("Authenticated with broker at {url} as {}", settings.username);
    Ok(ws)
}

/// State shared between the producer handle and its reader/writer tasks.
#[derive(Default)]
struct Shared {
    /// message id -> topic, for records not yet acknowledged
    pending: Mutex<HashMap<String, String>>,
    drained: Notify,
    closed: AtomicBool,
    reader_done: AtomicBool,
    disconnected: Notify,
}

impl Shared {
    fn pending(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn forget(&self, message_id: &str) {
        let now_empty = {
            let mut pending = self.pending();
            pending.remove(message_id);
            pending.is_empty()
        };
        if now_empty {
            self.drained.notify_waiters();
        }
    }

    fn resolve(
        &self,
        message_id: &str,
        result: std::result::Result<(), String>,
        reports: &DeliveryReportSender,
    ) {
        let (topic, now_empty) = {
            let mut pending = self.pending();
            let topic = pending.remove(message_id);
            (topic, pending.is_empty())
        };

        match topic {
            Some(topic) => {
                let _ = reports.send(DeliveryReport {
                    record_id: message_id.to_string(),
                    topic,
                    result,
                });
            }
            None => warn!("Acknowledgement for unknown message_id: {message_id}"),
        }

        if now_empty {
            self.drained.notify_waiters();
        }
    }

    fn fail_all_pending(&self, reason: &str, reports: &DeliveryReportSender) {
        let abandoned: Vec<_> = self.pending().drain().collect();
        if !abandoned.is_empty() {
            warn!("{} message(s) lost their acknowledgement: {reason}", abandoned.len());
        }
        for (record_id, topic) in abandoned {
            let _ = reports.send(DeliveryReport {
                record_id,
                topic,
                result: Err(reason.to_string()),
            });
        }
        self.drained.notify_waiters();
    }
}

/// Producer connected to a WebSocket broker.
pub struct WsProducer {
    outbound: mpsc::UnboundedSender<WsMessage>,
    shared: Arc<Shared>,
    queue_capacity: usize,
    admin_replies: tokio::sync::Mutex<mpsc::UnboundedReceiver<ServerMessage>>,
    request_timeout: Duration,
    tasks: Vec<JoinHandle<()>>,
}

impl WsProducer {
    /// Opens an authenticated session and starts the I/O tasks. Delivery
    /// reports for accepted records arrive on the returned receiver.
    pub async fn connect(settings: &BrokerSettings) -> Result<(Self, DeliveryReports)> {
        let ws = open_session(settings).await?;
        let (ws_sender, ws_receiver) = ws.split();

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<WsMessage>();
        let (report_tx, report_rx) = mpsc::unbounded_channel();
        let (admin_tx, admin_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared::default());

        let writer = tokio::spawn(write_loop(ws_sender, outbound_rx, shared.clone()));
        let reader = tokio::spawn(read_loop(ws_receiver, shared.clone(), report_tx, admin_tx));

        info!("Connected to broker at {}", settings.brokers);

        let producer = Self {
            outbound: outbound_tx,
            shared,
            queue_capacity: settings.queue_capacity,
            admin_replies: tokio::sync::Mutex::new(admin_rx),
            request_timeout: settings.request_timeout(),
            tasks: vec![writer, reader],
        };
        Ok((producer, report_rx))
    }

    async fn request(&self, msg: ClientMessage) -> std::result::Result<ServerMessage, AdminError> {
        let mut replies = self.admin_replies.lock().await;
        // discard replies nobody waited for
        while replies.try_recv().is_ok() {}

        let frame = encode(&msg).map_err(|e| AdminError::Protocol(e.to_string()))?;
        self.outbound
            .send(frame)
            .map_err(|_| AdminError::Disconnected)?;

        match tokio::time::timeout(self.request_timeout, replies.recv()).await {
            Ok(Some(reply)) => Ok(reply),
            Ok(None) => Err(AdminError::Disconnected),
            Err(_) => Err(AdminError::Timeout(self.request_timeout)),
        }
    }
}

impl BrokerClient for WsProducer {
    fn send(&self, record: Record) -> std::result::Result<(), SendError> {
        if self.shared.is_closed() {
            return Err(SendError::new(SendErrorKind::Closed, record));
        }

        let payload = match std::str::from_utf8(&record.payload) {
            Ok(payload) => payload.to_string(),
            Err(e) => {
                return Err(SendError::new(
                    SendErrorKind::InvalidPayload(e.to_string()),
                    record,
                ));
            }
        };

        {
            let mut pending = self.shared.pending();
            if pending.len() >= self.queue_capacity {
                return Err(SendError::new(SendErrorKind::QueueFull, record));
            }
            pending.insert(record.id.clone(), record.topic.clone());
        }
        // the reader may have failed everything pending between the check and the insert
        if self.shared.is_closed() {
            self.shared.forget(&record.id);
            return Err(SendError::new(SendErrorKind::Closed, record));
        }

        let publish = ClientMessage::Publish {
            topic: record.topic.clone(),
            payload,
            message_id: Some(record.id.clone()),
            qos: Some(1),
        };
        let frame = match encode(&publish) {
            Ok(frame) => frame,
            Err(e) => {
                self.shared.forget(&record.id);
                return Err(SendError::new(
                    SendErrorKind::InvalidPayload(e.to_string()),
                    record,
                ));
            }
        };

        if self.outbound.send(frame).is_err() {
            self.shared.forget(&record.id);
            return Err(SendError::new(SendErrorKind::Closed, record));
        }
        Ok(())
    }

    async fn flush(&self, timeout: Duration) -> FlushOutcome {
        let deadline = Instant::now() + timeout;
        loop {
            // register before checking so a wakeup between the two is not lost
            let drained = self.shared.drained.notified();
            if self.in_flight_count() == 0 {
                return FlushOutcome::Drained;
            }
            if tokio::time::timeout_at(deadline, drained).await.is_err() {
                return FlushOutcome::TimedOut {
                    in_flight: self.in_flight_count(),
                };
            }
        }
    }

    fn in_flight_count(&self) -> usize {
        self.shared.pending().len()
    }

    async fn close(&self) {
        let disconnected = self.shared.disconnected.notified();
        self.shared.closed.store(true, Ordering::SeqCst);
        if self.shared.reader_done.load(Ordering::SeqCst) {
            return;
        }

        if self.outbound.send(WsMessage::Close(None)).is_err() {
            return;
        }
        if tokio::time::timeout(CLOSE_GRACE, disconnected).await.is_err() {
            debug!("Broker did not close the connection within {CLOSE_GRACE:?}");
        }
    }
}

impl TopicAdmin for WsProducer {
    async fn topic_exists(&self, topic: &str) -> std::result::Result<bool, AdminError> {
        let describe = ClientMessage::DescribeTopic {
            topic: topic.to_string(),
        };
        match self.request(describe).await? {
            ServerMessage::TopicMetadata { exists, .. } => Ok(exists),
            ServerMessage::Error { message } => Err(AdminError::Rejected {
                topic: topic.to_string(),
                reason: message,
            }),
            other => Err(AdminError::Protocol(format!("{other:?}"))),
        }
    }

    async fn create_topic(&self, spec: &TopicSpec) -> std::result::Result<(), AdminError> {
        let create = ClientMessage::CreateTopic {
            topic: spec.name.clone(),
            partitions: spec.partitions,
            replication_factor: spec.replication_factor,
        };
        match self.request(create).await? {
            ServerMessage::TopicCreated { .. } => Ok(()),
            ServerMessage::Error { message } if message.contains("already exists") => {
                info!("Topic {} already exists, continuing", spec.name);
                Ok(())
            }
            ServerMessage::Error { message } => Err(AdminError::Rejected {
                topic: spec.name.clone(),
                reason: message,
            }),
            other => Err(AdminError::Protocol(format!("{other:?}"))),
        }
    }
}

impl Drop for WsProducer {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

async fn write_loop(
    mut sink: SplitSink<WsStream, WsMessage>,
    mut outbound: mpsc::UnboundedReceiver<WsMessage>,
    shared: Arc<Shared>,
) {
    while let Some(frame) = outbound.recv().await {
        let closing = frame.is_close();
        if let Err(e) = sink.send(frame).await {
            error!("Failed to write to broker: {e}");
            shared.closed.store(true, Ordering::SeqCst);
            break;
        }
        if closing {
            break;
        }
    }
    debug!("Writer loop closed");
}

async fn read_loop(
    mut stream: SplitStream<WsStream>,
    shared: Arc<Shared>,
    reports: DeliveryReportSender,
    admin: mpsc::UnboundedSender<ServerMessage>,
) {
    while let Some(frame) = stream.next().await {
        let text = match frame {
            Ok(WsMessage::Text(text)) => text,
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                warn!("Broker connection error: {e}");
                break;
            }
        };

        match serde_json::from_str::<ServerMessage>(text.as_str()) {
            Ok(ServerMessage::PublishAck { message_id }) => {
                shared.resolve(&message_id, Ok(()), &reports);
            }
            Ok(ServerMessage::PublishRejected { message_id, reason }) => {
                shared.resolve(&message_id, Err(reason), &reports);
            }
            Ok(reply) if reply.is_admin_reply() => {
                let _ = admin.send(reply);
            }
            Ok(other) => debug!("Ignoring broker frame: {other:?}"),
            Err(err) => warn!(
                "Invalid broker frame: {err} | {}",
                text.as_str().chars().take(100).collect::<String>()
            ),
        }
    }

    shared.closed.store(true, Ordering::SeqCst);
    shared.fail_all_pending("connection closed before acknowledgement", &reports);
    shared.reader_done.store(true, Ordering::SeqCst);
    shared.disconnected.notify_waiters();
    debug!("Reader loop closed");
}
