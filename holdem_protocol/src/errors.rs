use crate::Chips;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    Malformed(String),

    #[error("Unknown action encountered: {0}")]
    UnknownAction(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid raise value: {0}")]
    InvalidAmount(String),

    #[error("Invalid card: {0}")]
    InvalidCard(String),
}

impl From<serde_json::Error> for ProtocolError {
    fn from(e: serde_json::Error) -> Self {
        ProtocolError::Malformed(e.to_string())
    }
}

/// Errors reported back to the connection that caused them. None of these
/// change the table.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ServerError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("You need to join the game first")]
    NotJoined,

    #[error("You can only sit at one seat")]
    AlreadySeated,

    #[error("Invalid seat chosen: {0}")]
    InvalidSeat(String),

    #[error("Seat has already been taken")]
    SeatTaken,

    #[error("You are not seated at the table")]
    NotSeated,

    #[error("There is no hand in progress")]
    NoHandInProgress,

    #[error("Not your turn")]
    NotYourTurn,

    #[error("{0} can't fold right now")]
    CannotFold(String),

    #[error("{0} can't check when someone has bet")]
    CannotCheck(String),

    #[error("{0} has nothing to call")]
    CannotCall(String),

    #[error("{0} can't bet/raise right now")]
    CannotRaise(String),

    #[error("The minimum bet/raise is to {0}")]
    RaiseTooSmall(Chips),

    #[error("You can raise to at most {0}")]
    RaiseExceedsChips(Chips),

    #[error("No more cards left in deck")]
    DeckExhausted,

    #[error("Message too large: {0} bytes")]
    MessageTooLarge(usize),

    #[error("Rate limit exceeded")]
    RateLimited,
}
