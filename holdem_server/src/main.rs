mod betting;
mod deck;
mod game;
mod pot;
mod seats;
mod server;
mod table;

use crate::game::{GameState, TableConfig};
use crate::server::Hub;
use futures::stream::StreamExt;
use futures::SinkExt;
use holdem_protocol::{Chips, ServerError};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::signal;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

pub const SHUTDOWN_TIMEOUT_SECS: u64 = 5;

const LISTEN_ADDR: &str = "127.0.0.1:8080";
const SEATS: usize = 6;
const STARTING_CHIPS: Chips = 100;
const MIN_BET: Chips = 2;
const MAILBOX_CAPACITY: usize = 256;
const PING_PERIOD_SECS: u64 = 54;
const PONG_WAIT_SECS: u64 = 60;
const MAX_CONNECTIONS: usize = 100;
const MAX_MESSAGE_SIZE: usize = 4096;
// Two hole cards per seat plus the board must fit in one deck.
const MAX_SEATS: usize = (52 - 5) / 2;

/// Caps how many frames a connection may send per window.
struct RateLimiter {
    window_start: Instant,
    messages: u32,
}

impl RateLimiter {
    const MAX_MESSAGES: u32 = 100;
    const WINDOW: Duration = Duration::from_secs(1);

    fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            messages: 0,
        }
    }

    fn allow(&mut self, now: Instant) -> bool {
        if now.duration_since(self.window_start) >= Self::WINDOW {
            self.window_start = now;
            self.messages = 0;
        }
        if self.messages >= Self::MAX_MESSAGES {
            return false;
        }
        self.messages += 1;
        true
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub seats: usize,
    pub starting_chips: Chips,
    pub min_bet: Chips,
    pub mailbox_capacity: usize,
    pub ping_period: Duration,
    pub pong_wait: Duration,
    pub max_connections: usize,
    pub max_message_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: LISTEN_ADDR.to_string(),
            seats: SEATS,
            starting_chips: STARTING_CHIPS,
            min_bet: MIN_BET,
            mailbox_capacity: MAILBOX_CAPACITY,
            ping_period: Duration::from_secs(PING_PERIOD_SECS),
            pong_wait: Duration::from_secs(PONG_WAIT_SECS),
            max_connections: MAX_CONNECTIONS,
            max_message_size: MAX_MESSAGE_SIZE,
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by `HOLDEM_*` environment variables. Values that
    /// do not parse or make no sense are reported and ignored.
    pub fn from_env() -> Self {
        let env = |name: &str| std::env::var(name).ok();
        let defaults = Self::default();

        let ping_secs = setting(
            "HOLDEM_PING_PERIOD_SECS",
            env("HOLDEM_PING_PERIOD_SECS"),
            PING_PERIOD_SECS,
            |secs| *secs > 0,
        );
        let pong_secs = setting(
            "HOLDEM_PONG_WAIT_SECS",
            env("HOLDEM_PONG_WAIT_SECS"),
            PONG_WAIT_SECS.max(ping_secs + 1),
            |secs| *secs > ping_secs,
        );

        let seats = setting("HOLDEM_SEATS", env("HOLDEM_SEATS"), SEATS, |n| {
            (2..=MAX_SEATS).contains(n)
        });
        let starting_chips = setting(
            "HOLDEM_STARTING_CHIPS",
            env("HOLDEM_STARTING_CHIPS"),
            STARTING_CHIPS.min(max_starting_chips(seats)),
            |chips| (1..=max_starting_chips(seats)).contains(chips),
        );

        Self {
            listen_addr: env("HOLDEM_LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            seats,
            starting_chips,
            min_bet: setting("HOLDEM_MIN_BET", env("HOLDEM_MIN_BET"), MIN_BET, |bet| {
                *bet >= 2
            }),
            mailbox_capacity: setting(
                "HOLDEM_MAILBOX_CAPACITY",
                env("HOLDEM_MAILBOX_CAPACITY"),
                MAILBOX_CAPACITY,
                |n| *n > 0,
            ),
            ping_period: Duration::from_secs(ping_secs),
            pong_wait: Duration::from_secs(pong_secs),
            max_connections: setting(
                "HOLDEM_MAX_CONNECTIONS",
                env("HOLDEM_MAX_CONNECTIONS"),
                MAX_CONNECTIONS,
                |n| *n > 0,
            ),
            max_message_size: defaults.max_message_size,
        }
    }

    pub fn table_config(&self) -> TableConfig {
        TableConfig {
            seats: self.seats,
            starting_chips: self.starting_chips,
            min_bet: self.min_bet,
        }
    }
}

/// The largest stack that keeps every chip at a full table countable.
fn max_starting_chips(seats: usize) -> Chips {
    Chips::try_from(seats).map_or(0, |seats| Chips::MAX / seats.max(1))
}

fn setting<T>(name: &str, raw: Option<String>, default: T, valid: impl Fn(&T) -> bool) -> T
where
    T: FromStr + Display,
{
    let Some(raw) = raw else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(value) if valid(&value) => value,
        _ => {
            warn!("Ignoring {}={:?}, using {}", name, raw, default);
            default
        }
    }
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = Arc::new(ServerConfig::from_env());
    let hub = Arc::new(Mutex::new(Hub::new(GameState::new(config.table_config()))));

    let listener = TcpListener::bind(&config.listen_addr).await?;
    info!(
        "Hold'em server listening on {} ({} seats, blinds {}/{})",
        config.listen_addr,
        config.seats,
        config.min_bet / 2,
        config.min_bet
    );

    let shutdown = wait_for_shutdown_signal();
    tokio::pin!(shutdown);
    let mut active_connections: Vec<JoinHandle<()>> = Vec::new();

    loop {
        let (stream, addr) = tokio::select! {
            _ = &mut shutdown => break,
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    continue;
                }
            },
        };

        if !hub.lock().try_open_connection(config.max_connections) {
            warn!("Connection from {} rejected: too many connections", addr);
            continue;
        }

        let hub = Arc::clone(&hub);
        let config = Arc::clone(&config);
        active_connections.retain(|handle| !handle.is_finished());
        active_connections.push(tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, addr, Arc::clone(&hub), config).await {
                warn!("Connection {} ended with error: {}", addr, e);
            }
            hub.lock().close_connection();
        }));
    }

    info!("Shutdown signal received, waiting for connections to finish...");
    let deadline = Instant::now() + Duration::from_secs(SHUTDOWN_TIMEOUT_SECS);
    for mut handle in active_connections {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if tokio::time::timeout(remaining, &mut handle).await.is_err() {
            warn!("Shutdown timeout reached, closing connection task");
            handle.abort();
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    hub: Arc<Mutex<Hub>>,
    config: Arc<ServerConfig>,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream).await?;
    let client_id = Uuid::new_v4().to_string();
    info!("New client {} connected from {}", client_id, addr);

    let (mut sink, mut stream) = ws_stream.split();
    let (tx, mut rx) = mpsc::channel::<String>(config.mailbox_capacity);
    let connected = {
        let mut hub = hub.lock();
        hub.register(client_id.clone(), tx);
        hub.client_count()
    };
    debug!("{} clients connected", connected);

    let ping_period = config.ping_period;
    let writer = tokio::spawn(async move {
        let mut ping = tokio::time::interval(ping_period);
        ping.tick().await;
        loop {
            tokio::select! {
                message = rx.recv() => match message {
                    Some(text) => {
                        if let Err(e) = sink.send(Message::Text(text.into())).await {
                            debug!("Failed to send message: {}", e);
                            break;
                        }
                    }
                    None => {
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                },
                _ = ping.tick() => {
                    if sink.send(Message::Ping(Vec::<u8>::new().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let result = read_frames(&mut stream, &client_id, &hub, &config).await;

    hub.lock().unregister(&client_id);
    if tokio::time::timeout(Duration::from_secs(1), writer).await.is_err() {
        debug!("Writer for {} did not finish in time", client_id);
    }
    info!("Client {} disconnected", client_id);
    result
}

/// Feeds inbound frames to the hub one at a time until the peer leaves,
/// goes quiet for longer than the pong wait, or misbehaves.
async fn read_frames<S>(
    stream: &mut S,
    client_id: &str,
    hub: &Mutex<Hub>,
    config: &ServerConfig,
) -> anyhow::Result<()>
where
    S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    let mut rate_limiter = RateLimiter::new(Instant::now());

    loop {
        let frame = match tokio::time::timeout(config.pong_wait, stream.next()).await {
            Ok(Some(frame)) => frame?,
            Ok(None) => return Ok(()),
            Err(_) => {
                warn!("Client {} timed out", client_id);
                return Ok(());
            }
        };

        match frame {
            Message::Text(text) => {
                if text.len() > config.max_message_size {
                    warn!("Message from {} too large: {} bytes", client_id, text.len());
                    hub.lock().reject(client_id, ServerError::MessageTooLarge(text.len()));
                    return Ok(());
                }
                if !rate_limiter.allow(Instant::now()) {
                    warn!("Client {} exceeded rate limit", client_id);
                    hub.lock().reject(client_id, ServerError::RateLimited);
                    return Ok(());
                }
                if !hub.lock().handle_text(client_id, text.as_str()) {
                    debug!("Client {} was dropped by the hub", client_id);
                    return Ok(());
                }
            }
            Message::Close(_) => {
                debug!("Client {} sent close", client_id);
                return Ok(());
            }
            // Pongs and pings only need to reset the read deadline.
            _ => {}
        }
    }
}
