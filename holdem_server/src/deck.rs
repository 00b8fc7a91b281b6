use holdem_protocol::{Card, Rank, ServerError, Suit};
use rand::seq::SliceRandom;
use rand::thread_rng;
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DeckError {
    #[error("No more cards left in deck")]
    Exhausted,
}

impl From<DeckError> for ServerError {
    fn from(e: DeckError) -> Self {
        match e {
            DeckError::Exhausted => ServerError::DeckExhausted,
        }
    }
}

/// A single hand's worth of cards. Drawing walks a cursor forward, so a card
/// is never handed out twice.
#[derive(Debug, Clone)]
pub struct Deck {
    cards: Vec<Card>,
    next: usize,
}

impl Deck {
    /// All 52 cards in a uniformly random order.
    pub fn shuffled() -> Self {
        let mut cards = Self::ordered_cards();
        cards.shuffle(&mut thread_rng());
        Self::from_cards(cards)
    }

    /// A deck that deals `cards` front to back.
    pub(crate) fn from_cards(cards: Vec<Card>) -> Self {
        Self { cards, next: 0 }
    }

    fn ordered_cards() -> Vec<Card> {
        let mut cards = Vec::with_capacity(52);
        for suit in Suit::ALL {
            for rank in Rank::ALL {
                cards.push(Card::new(rank, suit));
            }
        }
        cards
    }

    pub fn draw(&mut self) -> Result<Card, DeckError> {
        let card = *self.cards.get(self.next).ok_or(DeckError::Exhausted)?;
        self.next += 1;
        Ok(card)
    }

    pub fn remaining(&self) -> usize {
        self.cards.len() - self.next
    }
}
