//! JSON messages exchanged over the websocket. Both directions use the
//! envelope `{"action": <name>, "params": {...}}`.

use crate::errors::ProtocolError;
use crate::types::{Card, PlayerStatus, Stage};
use crate::Chips;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Username attached to announcements generated by the table itself.
pub const SYSTEM_USERNAME: &str = "System";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerAction {
    Fold,
    Check,
    Call,
    Raise,
}

impl fmt::Display for PlayerAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PlayerAction::Fold => write!(f, "fold"),
            PlayerAction::Check => write!(f, "check"),
            PlayerAction::Call => write!(f, "call"),
            PlayerAction::Raise => write!(f, "raise"),
        }
    }
}

/// A decoded client request.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Join { username: String },
    SendMessage { username: String, message: String },
    TakeSeat { seat_id: String },
    Fold,
    Check,
    Call,
    /// Raise to this total for the current street.
    Raise(Chips),
}

#[derive(Deserialize)]
struct Envelope {
    action: String,
    #[serde(default)]
    params: Value,
}

fn str_param(params: &Value, name: &'static str) -> Result<String, ProtocolError> {
    match params.get(name) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(ProtocolError::MissingField(name)),
    }
}

fn amount_param(params: &Value, name: &'static str) -> Result<Chips, ProtocolError> {
    let value = params
        .get(name)
        .and_then(Value::as_f64)
        .ok_or(ProtocolError::MissingField(name))?;
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 || value > Chips::MAX as f64 {
        return Err(ProtocolError::InvalidAmount(value.to_string()));
    }
    Ok(value as Chips)
}

impl ClientMessage {
    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        let envelope: Envelope = serde_json::from_str(text)?;
        let params = &envelope.params;
        let message = match envelope.action.as_str() {
            "join" => ClientMessage::Join {
                username: str_param(params, "username")?,
            },
            "send-message" => ClientMessage::SendMessage {
                username: str_param(params, "username")?,
                message: str_param(params, "message")?,
            },
            "take-seat" => ClientMessage::TakeSeat {
                seat_id: str_param(params, "seatID")?,
            },
            "fold" => ClientMessage::Fold,
            "check" => ClientMessage::Check,
            "call" => ClientMessage::Call,
            "raise" => ClientMessage::Raise(amount_param(params, "value")?),
            other => return Err(ProtocolError::UnknownAction(other.to_string())),
        };
        Ok(message)
    }
}

impl fmt::Display for ClientMessage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ClientMessage::Join { username } => write!(f, "Join({})", username),
            ClientMessage::SendMessage { username, .. } => write!(f, "SendMessage({})", username),
            ClientMessage::TakeSeat { seat_id } => write!(f, "TakeSeat({})", seat_id),
            ClientMessage::Fold => write!(f, "Fold"),
            ClientMessage::Check => write!(f, "Check"),
            ClientMessage::Call => write!(f, "Call"),
            ClientMessage::Raise(amount) => write!(f, "Raise({})", amount),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "params", rename_all = "kebab-case")]
pub enum ServerMessage {
    OnJoin {
        #[serde(rename = "userID")]
        user_id: String,
        username: String,
    },
    OnTakeSeat {
        #[serde(rename = "seatID")]
        seat_id: String,
    },
    NewMessage {
        id: String,
        username: String,
        message: String,
    },
    UpdateGame(GameUpdate),
    Error {
        error: String,
    },
}

impl ServerMessage {
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::from)
    }
}

/// Full table snapshot as seen by one connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameUpdate {
    pub action_bar: ActionBar,
    pub players: Vec<PlayerView>,
    pub stage: Stage,
    pub table: TableView,
}

/// What the seat whose turn it is may do, and the amounts involved. Raise
/// amounts are increments over `call_amount`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionBar {
    pub actions: Vec<PlayerAction>,
    pub call_amount: Chips,
    pub chips_in_pot: Chips,
    pub min_raise_amount: Chips,
    pub max_raise_amount: Chips,
    pub total_chips: Chips,
    #[serde(rename = "seatID")]
    pub seat_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: String,
    pub name: String,
    pub chips: Chips,
    pub chips_in_pot: Option<Chips>,
    pub has_folded: bool,
    pub hole_cards: [Option<Card>; 2],
    pub is_active: bool,
    pub is_dealer: bool,
    pub status: PlayerStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableView {
    pub flop: [Option<Card>; 3],
    pub turn: Option<Card>,
    pub river: Option<Card>,
    pub pot: Chips,
}
