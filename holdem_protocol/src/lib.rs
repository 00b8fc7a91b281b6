mod errors;
pub mod hand;
mod messages;
mod types;

pub use errors::{ProtocolError, ServerError};
pub use hand::{best_hand, check_hand, find_winning_hands};
pub use messages::{
    ActionBar, ClientMessage, GameUpdate, PlayerAction, PlayerView, ServerMessage, TableView,
    SYSTEM_USERNAME,
};
pub use types::{Card, Hand, HandRank, PlayerStatus, Rank, Stage, Suit};

pub type Chips = u32;
pub type ServerResult<T> = std::result::Result<T, ServerError>;
