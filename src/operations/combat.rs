// Combat session driver - binary websocket handshake, heartbeat and scripted replay
use crate::error::{BotError, Result};
use crate::models::CombatTarget;
use crate::{debug_info, o_debug, o_error, o_info, o_trace};
use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout, timeout_at, Duration, Instant};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

pub const HANDSHAKE_TAG: &[u8; 3] = b"CLN";
pub const END_OF_BATTLE: [u8; 5] = [0x01, 0x00, 0x00, 0x00, 0x06];
pub const PING_PREFIX: [u8; 4] = [0x05, 0x00, 0x00, 0x00];
pub const PING_LEN: usize = 9;
pub const PONG_PREFIX: [u8; 3] = [0x05, 0x00, 0x04];

const OPEN_REQUEST: [u8; 3] = [0x01, 0x00, 0x05];
const OPEN_READY: [u8; 3] = [0x01, 0x00, 0x0f];
const OPEN_CONFIRM: [u8; 3] = [0x01, 0x00, 0x14];
const DEFAULT_CLOSE: [u8; 3] = [0x01, 0x00, 0x10];

const COMBAT_PORT: u16 = 3443;
const DRAIN_WINDOW: Duration = Duration::from_secs(1);
const END_POLL: Duration = Duration::from_secs(1);
const RESPONDER_JOIN: Duration = Duration::from_secs(2);

/// `CLN`, user id and engage id as little-endian u32, then the combat
/// guid with a little-endian u16 length prefix.
pub fn handshake_frame(user_id: u32, engage_id: u32, combat_guid: &str) -> Result<Vec<u8>> {
    let guid = combat_guid.as_bytes();
    let guid_len = u16::try_from(guid.len())
        .map_err(|_| BotError::protocol(format!("combat guid too long ({} bytes)", guid.len())))?;

    let mut frame = Vec::with_capacity(3 + 4 + 4 + 2 + guid.len());
    frame.extend_from_slice(HANDSHAKE_TAG);
    frame.extend_from_slice(&user_id.to_le_bytes());
    frame.extend_from_slice(&engage_id.to_le_bytes());
    frame.extend_from_slice(&guid_len.to_le_bytes());
    frame.extend_from_slice(guid);
    Ok(frame)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    EndOfBattle,
    /// Keep-alive ping; carries the pong to send back
    Ping(Vec<u8>),
    Other,
}

pub fn classify_frame(frame: &[u8]) -> InboundFrame {
    if frame == END_OF_BATTLE {
        return InboundFrame::EndOfBattle;
    }
    if frame.len() == PING_LEN && frame.starts_with(&PING_PREFIX) {
        let mut pong = PONG_PREFIX.to_vec();
        pong.extend_from_slice(&frame[frame.len() - 4..]);
        return InboundFrame::Ping(pong);
    }
    InboundFrame::Other
}

/// Outbound half of a combat connection
#[async_trait]
pub trait FrameSink: Send {
    async fn send_frame(&mut self, frame: Vec<u8>) -> Result<()>;
    async fn close(&mut self) -> Result<()>;
}

/// Inbound half; `None` once the peer has gone away
#[async_trait]
pub trait FrameStream: Send + Sync {
    async fn next_frame(&mut self) -> Option<Result<Vec<u8>>>;
}

#[async_trait]
pub trait CombatConnector: Send + Sync {
    async fn connect(&self, server_url: &str) -> Result<(Box<dyn FrameSink>, Box<dyn FrameStream>)>;
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct WsSink(SplitSink<WsStream, Message>);

pub struct WsFrames(SplitStream<WsStream>);

#[async_trait]
impl FrameSink for WsSink {
    async fn send_frame(&mut self, frame: Vec<u8>) -> Result<()> {
        self.0.send(Message::Binary(frame)).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.0.close().await?;
        Ok(())
    }
}

#[async_trait]
impl FrameStream for WsFrames {
    async fn next_frame(&mut self) -> Option<Result<Vec<u8>>> {
        loop {
            match self.0.next().await? {
                Ok(Message::Binary(bytes)) => return Some(Ok(bytes)),
                Ok(Message::Text(text)) => return Some(Ok(text.into_bytes())),
                Ok(Message::Close(_)) => return None,
                Ok(_) => continue,
                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}

/// Secure websocket connector for the battle servers
pub struct TungsteniteConnector {
    origin: String,
}

impl TungsteniteConnector {
    pub fn new(origin: impl Into<String>) -> Self {
        Self { origin: origin.into() }
    }
}

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36";

#[async_trait]
impl CombatConnector for TungsteniteConnector {
    async fn connect(&self, server_url: &str) -> Result<(Box<dyn FrameSink>, Box<dyn FrameStream>)> {
        let url = format!("wss://{}:{}", server_url, COMBAT_PORT);
        let mut request = url.as_str().into_client_request()?;
        let headers = request.headers_mut();
        let origin = HeaderValue::from_str(&self.origin)
            .map_err(|e| BotError::Socket(format!("bad origin header: {}", e)))?;
        headers.insert("Origin", origin);
        headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
        headers.insert("Pragma", HeaderValue::from_static("no-cache"));
        headers.insert("User-Agent", HeaderValue::from_static(USER_AGENT));

        o_debug!("[Combat] connecting to {}", url);
        let (socket, _response) = connect_async(request).await?;
        let (sink, stream) = socket.split();
        Ok((Box::new(WsSink(sink)), Box::new(WsFrames(stream))))
    }
}

/// One line per frame: `<hex bytes> <delay seconds>`
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptStep {
    pub command: Vec<u8>,
    pub delay: Duration,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CombatScript {
    pub steps: Vec<ScriptStep>,
}

impl CombatScript {
    pub fn parse(text: &str) -> Result<Self> {
        let mut steps = Vec::new();
        for (index, line) in text.lines().enumerate() {
            let line_no = index + 1;
            let mut parts = line.split_whitespace();
            let Some(hex_part) = parts.next() else {
                continue;
            };
            let script_error = |message: String| BotError::Script { line: line_no, message };

            let delay_part = parts
                .next()
                .ok_or_else(|| script_error("missing delay".to_string()))?;
            let command = hex::decode(hex_part)
                .map_err(|e| script_error(format!("bad hex '{}': {}", hex_part, e)))?;
            let seconds: f64 = delay_part
                .parse()
                .map_err(|_| script_error(format!("bad delay '{}'", delay_part)))?;
            if !seconds.is_finite() || seconds < 0.0 {
                return Err(script_error(format!("delay out of range: {}", seconds)));
            }

            steps.push(ScriptStep {
                command,
                delay: Duration::from_secs_f64(seconds),
            });
        }
        Ok(Self { steps })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Set once when the battle-end sentinel arrives
#[derive(Debug, Default)]
pub struct EndSignal(AtomicBool);

impl EndSignal {
    /// True only for the call that actually raised the signal
    pub fn raise(&self) -> bool {
        !self.0.swap(true, Ordering::SeqCst)
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponderExit {
    EndOfBattle,
    Disconnected,
    Failed,
}

type SharedSink = Arc<Mutex<Box<dyn FrameSink>>>;

/// Drain inbound frames, answer pings, stop on the end sentinel.
/// Errors end the responder and are only logged.
pub async fn run_heartbeat(
    mut stream: Box<dyn FrameStream>,
    sink: SharedSink,
    end: Arc<EndSignal>,
    connected: Arc<AtomicBool>,
) -> ResponderExit {
    loop {
        let frame = match stream.next_frame().await {
            None => {
                connected.store(false, Ordering::SeqCst);
                return ResponderExit::Disconnected;
            }
            Some(Err(e)) => {
                o_error!("Heartbeat error: {}", e);
                connected.store(false, Ordering::SeqCst);
                return ResponderExit::Failed;
            }
            Some(Ok(frame)) => frame,
        };
        if frame.is_empty() {
            continue;
        }

        match classify_frame(&frame) {
            InboundFrame::EndOfBattle => {
                end.raise();
                o_debug!("[Combat] battle end signal received");
                return ResponderExit::EndOfBattle;
            }
            InboundFrame::Ping(pong) => {
                o_trace!("[Combat] ping {}", hex::encode(&frame));
                if let Err(e) = sink.lock().await.send_frame(pong).await {
                    o_error!("Heartbeat error: {}", e);
                    connected.store(false, Ordering::SeqCst);
                    return ResponderExit::Failed;
                }
            }
            InboundFrame::Other => {}
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Handshaking,
    Open,
    ReplayingScript,
    Idle,
    Closed,
}

/// An open, post-handshake battle connection
pub struct CombatSession {
    sink: SharedSink,
    stream: Option<Box<dyn FrameStream>>,
    connected: Arc<AtomicBool>,
    end: Arc<EndSignal>,
    state: SessionState,
}

impl CombatSession {
    fn new(sink: Box<dyn FrameSink>, stream: Box<dyn FrameStream>) -> Self {
        Self {
            sink: Arc::new(Mutex::new(sink)),
            stream: Some(stream),
            connected: Arc::new(AtomicBool::new(true)),
            end: Arc::new(EndSignal::default()),
            state: SessionState::Disconnected,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn battle_ended(&self) -> bool {
        self.end.is_set()
    }

    pub async fn send(&self, frame: Vec<u8>) -> Result<()> {
        self.sink.lock().await.send_frame(frame).await
    }

    async fn recv(&mut self) -> Result<Vec<u8>> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| BotError::Socket("inbound frames already handed to the responder".to_string()))?;
        match stream.next_frame().await {
            Some(frame) => frame,
            None => {
                self.connected.store(false, Ordering::SeqCst);
                Err(BotError::Socket("connection closed".to_string()))
            }
        }
    }

    /// Discard everything that arrives within `window`
    async fn drain(&mut self, window: Duration) -> Result<usize> {
        let deadline = Instant::now() + window;
        let mut drained = 0;
        while Instant::now() < deadline {
            match timeout_at(deadline, self.recv()).await {
                Ok(frame) => {
                    frame?;
                    drained += 1;
                }
                Err(_) => break,
            }
        }
        Ok(drained)
    }

    async fn handshake(&mut self, frame: Vec<u8>) -> Result<()> {
        self.state = SessionState::Handshaking;
        self.send(frame).await?;
        self.send(OPEN_REQUEST.to_vec()).await?;
        self.recv().await?;
        self.recv().await?;
        self.send(OPEN_READY.to_vec()).await?;
        let drained = self.drain(DRAIN_WINDOW).await?;
        o_trace!("[Combat] drained {} frames during opening", drained);
        self.send(OPEN_CONFIRM.to_vec()).await?;
        self.recv().await?;
        self.state = SessionState::Open;
        Ok(())
    }

    /// Replay `script` while a responder keeps the connection alive, then
    /// wait for the battle to end and close.
    pub async fn replay(mut self, script: &CombatScript) -> Result<()> {
        let stream = self
            .stream
            .take()
            .ok_or_else(|| BotError::Socket("session already replaying".to_string()))?;
        let mut responder = tokio::spawn(run_heartbeat(
            stream,
            self.sink.clone(),
            self.end.clone(),
            self.connected.clone(),
        ));

        self.state = SessionState::ReplayingScript;
        let played = self.play(script).await;

        self.state = SessionState::Idle;
        if played.is_ok() {
            while !self.battle_ended() && self.is_connected() && !responder.is_finished() {
                sleep(END_POLL).await;
            }
        }

        match timeout(RESPONDER_JOIN, &mut responder).await {
            Ok(Ok(exit)) => o_debug!("[Combat] responder stopped: {:?}", exit),
            Ok(Err(e)) => o_error!("Heartbeat task failed: {}", e),
            Err(_) => {
                o_debug!("[Combat] responder still running after join window");
                responder.abort();
            }
        }

        // A failed step wins over a failed close
        let closed = self.close().await;
        played.and(closed)
    }

    async fn play(&self, script: &CombatScript) -> Result<()> {
        for step in &script.steps {
            self.send(step.command.clone()).await?;
            sleep(step.delay).await;
        }
        Ok(())
    }

    /// Default short sequence used when no script is supplied
    pub async fn finish_default(mut self) -> Result<()> {
        self.state = SessionState::Idle;
        self.send(DEFAULT_CLOSE.to_vec()).await?;
        self.send(DEFAULT_CLOSE.to_vec()).await?;
        self.close().await
    }

    pub async fn close(&mut self) -> Result<()> {
        if self.state == SessionState::Closed {
            return Ok(());
        }
        self.state = SessionState::Closed;
        if self.connected.swap(false, Ordering::SeqCst) {
            self.sink.lock().await.close().await?;
        }
        Ok(())
    }
}

/// Opens battle connections for one user
#[derive(Clone)]
pub struct CombatDriver {
    connector: Arc<dyn CombatConnector>,
    user_id: u32,
}

impl CombatDriver {
    pub fn new(connector: Arc<dyn CombatConnector>, user_id: u32) -> Self {
        Self { connector, user_id }
    }

    /// Connect and run the opening sequence, handing the session back
    pub async fn open(&self, target: &CombatTarget) -> Result<CombatSession> {
        let (sink, stream) = self.connector.connect(&target.server_url).await?;
        let mut session = CombatSession::new(sink, stream);
        let frame = handshake_frame(self.user_id, target.engage_id, &target.combat_guid)?;
        debug_info!("handshake {}", hex::encode(&frame));
        session.handshake(frame).await?;
        o_info!("[Combat] engaged {} (engage {})", target.combat_guid, target.engage_id);
        Ok(session)
    }

    /// Open and close with the default sequence. Opening failures are
    /// logged, the server finishes the battle on its own.
    pub async fn engage_default(&self, target: &CombatTarget) -> Result<()> {
        match self.open(target).await {
            Ok(session) => session.finish_default().await,
            Err(e) => {
                o_error!("No response: {}", e);
                Ok(())
            }
        }
    }

    pub async fn engage_scripted(&self, target: &CombatTarget, script: &CombatScript) -> Result<()> {
        let session = self.open(target).await?;
        session.replay(script).await
    }
}
