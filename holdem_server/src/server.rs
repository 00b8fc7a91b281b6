use crate::game::{GameState, Move};
use holdem_protocol::{
    ClientMessage, ServerError, ServerMessage, ServerResult, SYSTEM_USERNAME,
};
use log::{debug, error, info, warn};
use std::collections::HashMap;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::Sender;
use uuid::Uuid;

pub type ClientId = String;

const MAX_CHAT_LENGTH: usize = 500;
const MAX_NAME_LENGTH: usize = 20;

struct Client {
    username: Option<String>,
    seat: Option<usize>,
    mailbox: Sender<String>,
}

/// Owns the table and every connection's outbound mailbox.
///
/// The hub lives behind one mutex. Each call handles one inbound message to
/// completion, including fan-out, and never waits on a socket: delivery is
/// a `try_send` into the connection's bounded mailbox. A connection whose
/// mailbox is full or closed is dropped on the spot, which frees its seat
/// the same way a disconnect does.
pub struct Hub {
    game: GameState,
    clients: HashMap<ClientId, Client>,
    connections: usize,
    overflowed: Vec<ClientId>,
}

impl Hub {
    pub fn new(game: GameState) -> Self {
        Self {
            game,
            clients: HashMap::new(),
            connections: 0,
            overflowed: Vec::new(),
        }
    }

    pub fn game(&self) -> &GameState {
        &self.game
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Reserves a connection slot before the websocket handshake.
    pub fn try_open_connection(&mut self, max_connections: usize) -> bool {
        if self.connections >= max_connections {
            return false;
        }
        self.connections += 1;
        true
    }

    pub fn close_connection(&mut self) {
        self.connections = self.connections.saturating_sub(1);
    }

    pub fn register(&mut self, id: ClientId, mailbox: Sender<String>) {
        debug!("Registering client {}", id);
        self.clients.insert(
            id,
            Client {
                username: None,
                seat: None,
                mailbox,
            },
        );
    }

    /// Removes a connection. A seat it held is vacated, or played out by the
    /// table if a hand is running.
    pub fn unregister(&mut self, id: &str) {
        if self.remove_client(id) {
            self.broadcast_state();
            self.settle();
        }
    }

    /// Entry point for one raw text frame. Returns false once `id` is no
    /// longer registered, which tells the reader to stop.
    pub fn handle_text(&mut self, id: &str, text: &str) -> bool {
        if !self.clients.contains_key(id) {
            debug!("Ignoring message from dropped client {}", id);
            return false;
        }
        let result = ClientMessage::from_json(text)
            .map_err(ServerError::from)
            .and_then(|message| self.handle_message(id, message));
        if let Err(e) = result {
            self.report(id, e);
        }
        self.settle();
        self.clients.contains_key(id)
    }

    pub fn handle_message(&mut self, id: &str, message: ClientMessage) -> ServerResult<()> {
        debug!("{} -> {}", id, message);
        match message {
            ClientMessage::Join { username } => self.join(id, &username),
            ClientMessage::SendMessage { username, message } => {
                self.chat(id, username, &message);
                Ok(())
            }
            ClientMessage::TakeSeat { seat_id } => self.take_seat(id, &seat_id),
            ClientMessage::Fold => self.act(id, Move::Fold),
            ClientMessage::Check => self.act(id, Move::Check),
            ClientMessage::Call => self.act(id, Move::Call),
            ClientMessage::Raise(amount) => self.act(id, Move::Raise(amount)),
        }
    }

    fn join(&mut self, id: &str, username: &str) -> ServerResult<()> {
        let username = sanitize_player_name(username);
        if let Some(client) = self.clients.get_mut(id) {
            client.username = Some(username.clone());
        }
        info!("{} joined as {}", id, username);

        self.send(
            id,
            &ServerMessage::OnJoin {
                user_id: id.to_string(),
                username: username.clone(),
            },
        );
        self.announce(format!("{} joined the game.", username));
        self.send_update(id);
        Ok(())
    }

    fn chat(&mut self, id: &str, username: String, message: &str) {
        let message = sanitize_chat_message(message);
        if message.is_empty() {
            return;
        }
        let username = self
            .clients
            .get(id)
            .and_then(|c| c.username.clone())
            .unwrap_or(username);
        self.broadcast(&ServerMessage::NewMessage {
            id: Uuid::new_v4().to_string(),
            username,
            message,
        });
    }

    fn take_seat(&mut self, id: &str, seat_id: &str) -> ServerResult<()> {
        let client = self.clients.get(id).ok_or(ServerError::NotJoined)?;
        let username = client.username.clone().ok_or(ServerError::NotJoined)?;
        if client.seat.is_some() {
            return Err(ServerError::AlreadySeated);
        }

        let seat = self.game.take_seat(seat_id, &username)?;
        if let Some(client) = self.clients.get_mut(id) {
            client.seat = Some(seat);
        }
        self.send(
            id,
            &ServerMessage::OnTakeSeat {
                seat_id: seat_id.to_string(),
            },
        );
        self.broadcast_state();
        Ok(())
    }

    fn act(&mut self, id: &str, action: Move) -> ServerResult<()> {
        let seat = self
            .clients
            .get(id)
            .and_then(|c| c.seat)
            .ok_or(ServerError::NotSeated)?;
        self.game.act(seat, action)?;
        self.broadcast_state();
        Ok(())
    }

    /// Tells one connection why its input was refused.
    pub fn reject(&mut self, id: &str, e: ServerError) {
        self.report(id, e);
        self.settle();
    }

    /// Rule and protocol errors go back to the sender only. A drained deck
    /// means the table is broken, not the player.
    fn report(&mut self, id: &str, e: ServerError) {
        if e == ServerError::DeckExhausted {
            error!("Invariant violated while handling {}: {}", id, e);
            return;
        }
        debug!("Rejected message from {}: {}", id, e);
        self.send(id, &ServerMessage::Error { error: e.to_string() });
    }

    /// Flushes queued table announcements, then sends every connection its
    /// own view of the table.
    fn broadcast_state(&mut self) {
        for message in self.game.drain_announcements() {
            self.announce(message);
        }
        let ids: Vec<ClientId> = self.clients.keys().cloned().collect();
        for id in ids {
            self.send_update(&id);
        }
    }

    fn send_update(&mut self, id: &str) {
        let Some(client) = self.clients.get(id) else {
            return;
        };
        let update = ServerMessage::UpdateGame(self.game.snapshot(client.seat));
        self.send(id, &update);
    }

    fn announce(&mut self, message: String) {
        self.broadcast(&ServerMessage::NewMessage {
            id: Uuid::new_v4().to_string(),
            username: SYSTEM_USERNAME.to_string(),
            message,
        });
    }

    fn broadcast(&mut self, message: &ServerMessage) {
        let Some(json) = encode(message) else {
            return;
        };
        for (id, client) in &self.clients {
            if !deliver(id, &client.mailbox, json.clone()) {
                self.overflowed.push(id.clone());
            }
        }
    }

    fn send(&mut self, id: &str, message: &ServerMessage) {
        let Some(client) = self.clients.get(id) else {
            return;
        };
        let Some(json) = encode(message) else {
            return;
        };
        if !deliver(id, &client.mailbox, json) {
            self.overflowed.push(id.to_string());
        }
    }

    /// Drops connections whose mailboxes overflowed. Dropping one changes
    /// the table, and telling the others about it can overflow more.
    fn settle(&mut self) {
        while !self.overflowed.is_empty() {
            let dropped = std::mem::take(&mut self.overflowed);
            let mut seat_released = false;
            for id in dropped {
                seat_released |= self.remove_client(&id);
            }
            if seat_released {
                self.broadcast_state();
            }
        }
    }

    /// Returns true if the client held a seat, i.e. the table changed.
    fn remove_client(&mut self, id: &str) -> bool {
        let Some(client) = self.clients.remove(id) else {
            return false;
        };
        info!("Client {} removed", id);
        let Some(seat) = client.seat else {
            return false;
        };
        if let Err(e) = self.game.leave(seat) {
            error!("Failed to release seat for {}: {}", id, e);
        }
        true
    }
}

fn encode(message: &ServerMessage) -> Option<String> {
    match message.to_json() {
        Ok(json) => Some(json),
        Err(e) => {
            error!("Failed to serialize message: {}", e);
            None
        }
    }
}

fn deliver(id: &str, mailbox: &Sender<String>, json: String) -> bool {
    match mailbox.try_send(json) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            warn!("Mailbox full for {}, dropping connection", id);
            false
        }
        Err(TrySendError::Closed(_)) => {
            debug!("Mailbox closed for {}", id);
            false
        }
    }
}

/// Keeps letters, digits, spaces, `_` and `-`, trimmed and capped in length.
pub fn sanitize_player_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '_' | '-'))
        .take(MAX_NAME_LENGTH)
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        "Player".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Drops control characters, collapses each run of whitespace to a single
/// space and caps the length.
pub fn sanitize_chat_message(text: &str) -> String {
    let kept: String = text
        .chars()
        .take(MAX_CHAT_LENGTH)
        .filter(|c| c.is_whitespace() || !c.is_control())
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deck::Deck;
    use crate::game::TableConfig;
    use holdem_protocol::Stage;
    use serde_json::Value;
    use tokio::sync::mpsc::{self, Receiver};

    fn hub() -> Hub {
        Hub::new(GameState::with_deck_factory(
            TableConfig::default(),
            Box::new(Deck::shuffled),
        ))
    }

    fn connect(hub: &mut Hub, id: &str) -> Receiver<String> {
        let (tx, rx) = mpsc::channel(256);
        hub.register(id.to_string(), tx);
        rx
    }

    fn drain(rx: &mut Receiver<String>) -> Vec<Value> {
        let mut messages = Vec::new();
        while let Ok(text) = rx.try_recv() {
            messages.push(serde_json::from_str(&text).unwrap());
        }
        messages
    }

    fn actions(messages: &[Value]) -> Vec<&str> {
        messages.iter().map(|m| m["action"].as_str().unwrap()).collect()
    }

    fn seated_pair(hub: &mut Hub) -> (Receiver<String>, Receiver<String>) {
        let mut ann = connect(hub, "ann-id");
        let mut bob = connect(hub, "bob-id");
        hub.handle_text("ann-id", r#"{"action":"join","params":{"username":"ann"}}"#);
        hub.handle_text("bob-id", r#"{"action":"join","params":{"username":"bob"}}"#);
        hub.handle_text("ann-id", r#"{"action":"take-seat","params":{"seatID":"1"}}"#);
        hub.handle_text("bob-id", r#"{"action":"take-seat","params":{"seatID":"2"}}"#);
        drain(&mut ann);
        drain(&mut bob);
        (ann, bob)
    }

    #[test]
    fn test_join_replies_to_joiner_and_announces_to_all() {
        let mut hub = hub();
        let mut ann = connect(&mut hub, "ann-id");
        let mut bob = connect(&mut hub, "bob-id");

        hub.handle_text("ann-id", r#"{"action":"join","params":{"username":"ann"}}"#);

        let to_ann = drain(&mut ann);
        assert_eq!(actions(&to_ann), vec!["on-join", "new-message", "update-game"]);
        assert_eq!(to_ann[0]["params"]["userID"], "ann-id");
        assert_eq!(to_ann[1]["params"]["username"], SYSTEM_USERNAME);
        assert_eq!(to_ann[1]["params"]["message"], "ann joined the game.");

        let to_bob = drain(&mut bob);
        assert_eq!(actions(&to_bob), vec!["new-message"]);
    }

    #[test]
    fn test_errors_go_only_to_sender() {
        let mut hub = hub();
        let mut ann = connect(&mut hub, "ann-id");
        let mut bob = connect(&mut hub, "bob-id");

        hub.handle_text("ann-id", r#"{"action":"take-seat","params":{"seatID":"1"}}"#);
        hub.handle_text("ann-id", r#"{"action":"shuffle","params":{}}"#);
        hub.handle_text("ann-id", "{not json");

        let to_ann = drain(&mut ann);
        assert_eq!(actions(&to_ann), vec!["error", "error", "error"]);
        assert_eq!(to_ann[0]["params"]["error"], "You need to join the game first");
        assert_eq!(
            to_ann[1]["params"]["error"],
            "Unknown action encountered: shuffle"
        );
        assert!(drain(&mut bob).is_empty());
    }

    #[test]
    fn test_take_seat_starts_hand_with_private_cards() {
        let mut hub = hub();
        let mut ann = connect(&mut hub, "ann-id");
        let mut bob = connect(&mut hub, "bob-id");
        hub.handle_text("ann-id", r#"{"action":"join","params":{"username":"ann"}}"#);
        hub.handle_text("bob-id", r#"{"action":"join","params":{"username":"bob"}}"#);
        hub.handle_text("ann-id", r#"{"action":"take-seat","params":{"seatID":"1"}}"#);
        drain(&mut ann);
        drain(&mut bob);

        hub.handle_text("bob-id", r#"{"action":"take-seat","params":{"seatID":"2"}}"#);
        assert_eq!(hub.game().stage(), Stage::Preflop);

        let to_bob = drain(&mut bob);
        assert_eq!(to_bob[0]["action"], "on-take-seat");
        assert_eq!(to_bob[0]["params"]["seatID"], "2");
        let update = &to_bob.last().unwrap()["params"];
        assert_eq!(update["stage"], "Preflop");
        assert!(update["players"][1]["holeCards"][0].is_object());
        assert!(update["players"][0]["holeCards"][0].is_null());

        let to_ann = drain(&mut ann);
        let messages: Vec<&str> = to_ann
            .iter()
            .filter(|m| m["action"] == "new-message")
            .map(|m| m["params"]["message"].as_str().unwrap())
            .collect();
        assert_eq!(messages, vec!["Starting new hand."]);
        let update = &to_ann.last().unwrap()["params"];
        assert!(update["players"][0]["holeCards"][0].is_object());
        assert!(update["players"][1]["holeCards"][0].is_null());
        assert_eq!(update["actionBar"]["actions"], serde_json::json!(["fold", "call", "raise"]));
    }

    #[test]
    fn test_second_seat_and_taken_seat_are_rejected() {
        let mut hub = hub();
        let (mut ann, mut bob) = seated_pair(&mut hub);

        hub.handle_text("ann-id", r#"{"action":"take-seat","params":{"seatID":"3"}}"#);
        hub.handle_text("bob-id", r#"{"action":"take-seat","params":{"seatID":"1"}}"#);

        let to_ann = drain(&mut ann);
        assert_eq!(to_ann.len(), 1);
        assert_eq!(to_ann[0]["params"]["error"], "You can only sit at one seat");
        let to_bob = drain(&mut bob);
        assert_eq!(to_bob.len(), 1);
        assert_eq!(to_bob[0]["params"]["error"], "You can only sit at one seat");
    }

    #[test]
    fn test_action_out_of_turn_is_private_error() {
        let mut hub = hub();
        let (mut ann, mut bob) = seated_pair(&mut hub);

        // Heads-up, ann has the button and acts first.
        hub.handle_text("bob-id", r#"{"action":"call","params":{}}"#);
        let to_bob = drain(&mut bob);
        assert_eq!(actions(&to_bob), vec!["error"]);
        assert_eq!(to_bob[0]["params"]["error"], "Not your turn");
        assert!(drain(&mut ann).is_empty());

        hub.handle_text("ann-id", r#"{"action":"call","params":{}}"#);
        let to_bob = drain(&mut bob);
        assert_eq!(actions(&to_bob), vec!["new-message", "update-game"]);
        assert_eq!(to_bob[0]["params"]["message"], "ann calls.");
    }

    #[test]
    fn test_chat_is_sanitized_and_broadcast() {
        let mut hub = hub();
        let mut ann = connect(&mut hub, "ann-id");
        let mut bob = connect(&mut hub, "bob-id");
        hub.handle_text("ann-id", r#"{"action":"join","params":{"username":"ann"}}"#);
        drain(&mut ann);
        drain(&mut bob);

        hub.handle_text(
            "ann-id",
            r#"{"action":"send-message","params":{"username":"mallory","message":"  hi\nthere\u0007 "}}"#,
        );
        hub.handle_text(
            "ann-id",
            r#"{"action":"send-message","params":{"username":"ann","message":"   "}}"#,
        );

        let to_bob = drain(&mut bob);
        assert_eq!(to_bob.len(), 1);
        assert_eq!(to_bob[0]["params"]["username"], "ann");
        assert_eq!(to_bob[0]["params"]["message"], "hi there");
        assert_eq!(drain(&mut ann).len(), 1);
    }

    #[test]
    fn test_full_mailbox_drops_slow_client() {
        let mut hub = hub();
        let (mut ann, _bob) = seated_pair(&mut hub);
        let (tx, _slow) = mpsc::channel(1);
        hub.register("slow-id".to_string(), tx);

        hub.handle_text("ann-id", r#"{"action":"send-message","params":{"username":"ann","message":"one"}}"#);
        assert_eq!(hub.client_count(), 3);
        hub.handle_text("ann-id", r#"{"action":"send-message","params":{"username":"ann","message":"two"}}"#);
        assert_eq!(hub.client_count(), 2);
        assert_eq!(drain(&mut ann).len(), 2);
    }

    #[test]
    fn test_dropped_client_is_ignored_after_overflow() {
        let mut hub = hub();
        let (mut ann, _bob) = seated_pair(&mut hub);
        let (tx, _slow) = mpsc::channel(1);
        hub.register("slow-id".to_string(), tx);

        assert!(hub.handle_text("ann-id", r#"{"action":"send-message","params":{"username":"ann","message":"one"}}"#));
        assert!(hub.handle_text("ann-id", r#"{"action":"send-message","params":{"username":"ann","message":"two"}}"#));
        assert_eq!(hub.client_count(), 2);
        drain(&mut ann);

        assert!(!hub.handle_text("slow-id", r#"{"action":"join","params":{"username":"ghost"}}"#));
        assert!(!hub.handle_text("slow-id", r#"{"action":"send-message","params":{"username":"ghost","message":"still here"}}"#));
        assert!(drain(&mut ann).is_empty());
        assert_eq!(hub.client_count(), 2);
    }

    #[test]
    fn test_disconnect_mid_hand_hands_seat_to_table() {
        let mut hub = hub();
        let (_ann, mut bob) = seated_pair(&mut hub);

        // Ann is first to act; her seat folds for her.
        hub.unregister("ann-id");
        assert_eq!(hub.client_count(), 1);
        assert_eq!(hub.game().stage(), Stage::Waiting);
        assert_eq!(hub.game().seats().get(1).chips, 101);

        let to_bob = drain(&mut bob);
        let messages: Vec<&str> = to_bob
            .iter()
            .filter(|m| m["action"] == "new-message")
            .map(|m| m["params"]["message"].as_str().unwrap())
            .collect();
        assert_eq!(messages, vec!["ann folds.", "bob won the hand."]);
        assert_eq!(actions(&to_bob).last(), Some(&"update-game"));
    }

    #[tokio::test]
    async fn test_closed_mailbox_frees_seat() {
        let mut hub = hub();
        let mut ann = connect(&mut hub, "ann-id");
        hub.handle_text("ann-id", r#"{"action":"join","params":{"username":"ann"}}"#);
        hub.handle_text("ann-id", r#"{"action":"take-seat","params":{"seatID":"4"}}"#);
        assert_eq!(ann.recv().await.map(|t| t.contains("on-join")), Some(true));
        drop(ann);

        let mut bob = connect(&mut hub, "bob-id");
        hub.handle_text("bob-id", r#"{"action":"join","params":{"username":"bob"}}"#);
        assert_eq!(hub.client_count(), 1);
        assert_eq!(
            hub.game().seats().get(3).status,
            holdem_protocol::PlayerStatus::Vacated
        );
        assert!(bob.recv().await.is_some());
    }

    #[test]
    fn test_sanitize_chat_message() {
        assert_eq!(sanitize_chat_message("hello\tworld"), "hello world");
        assert_eq!(sanitize_chat_message("\u{0}bell\u{7}"), "bell");
        assert_eq!(sanitize_chat_message(&"x".repeat(600)).len(), 500);
        assert_eq!(sanitize_chat_message("  \n "), "");
        assert_eq!(sanitize_chat_message("a \n b\r\n\tc"), "a b c");
    }

    #[test]
    fn test_sanitize_player_name() {
        assert_eq!(sanitize_player_name("ann"), "ann");
        assert_eq!(sanitize_player_name(" <b>bob</b> "), "bbobb");
        assert_eq!(sanitize_player_name("!!!"), "Player");
        assert_eq!(sanitize_player_name(&"a".repeat(40)).len(), 20);
    }
}
