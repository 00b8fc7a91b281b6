use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use crate::errors::ProtocolError;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Suit {
    Clubs,
    Diamonds,
    Hearts,
    Spades,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Clubs, Suit::Diamonds, Suit::Hearts, Suit::Spades];

    /// Position of the suit on the wire (clubs = 0 .. spades = 3).
    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Suit::Clubs => write!(f, "♣"),
            Suit::Diamonds => write!(f, "♦"),
            Suit::Hearts => write!(f, "♥"),
            Suit::Spades => write!(f, "♠"),
        }
    }
}

impl Serialize for Suit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.index())
    }
}

impl<'de> Deserialize<'de> for Suit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let index = u8::deserialize(deserializer)?;
        Suit::from_index(index).ok_or_else(|| de::Error::custom(format!("invalid suit {index}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Rank {
    Two = 2,
    Three = 3,
    Four = 4,
    Five = 5,
    Six = 6,
    Seven = 7,
    Eight = 8,
    Nine = 9,
    Ten = 10,
    Jack = 11,
    Queen = 12,
    King = 13,
    Ace = 14,
}

impl Rank {
    pub const ALL: [Rank; 13] = [
        Rank::Two,
        Rank::Three,
        Rank::Four,
        Rank::Five,
        Rank::Six,
        Rank::Seven,
        Rank::Eight,
        Rank::Nine,
        Rank::Ten,
        Rank::Jack,
        Rank::Queen,
        Rank::King,
        Rank::Ace,
    ];

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            2 => Some(Rank::Two),
            3 => Some(Rank::Three),
            4 => Some(Rank::Four),
            5 => Some(Rank::Five),
            6 => Some(Rank::Six),
            7 => Some(Rank::Seven),
            8 => Some(Rank::Eight),
            9 => Some(Rank::Nine),
            10 => Some(Rank::Ten),
            11 => Some(Rank::Jack),
            12 => Some(Rank::Queen),
            13 => Some(Rank::King),
            14 => Some(Rank::Ace),
            _ => None,
        }
    }

    /// Position of the rank on the wire (two = 0 .. ace = 12).
    pub fn index(self) -> u8 {
        self as u8 - 2
    }

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    /// Plural of the rank's name, as in "a pair of sixes".
    pub fn plural(self) -> String {
        match self {
            Rank::Six => "Sixes".to_string(),
            other => format!("{}s", other.name()),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Rank::Two => "Two",
            Rank::Three => "Three",
            Rank::Four => "Four",
            Rank::Five => "Five",
            Rank::Six => "Six",
            Rank::Seven => "Seven",
            Rank::Eight => "Eight",
            Rank::Nine => "Nine",
            Rank::Ten => "Ten",
            Rank::Jack => "Jack",
            Rank::Queen => "Queen",
            Rank::King => "King",
            Rank::Ace => "Ace",
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Rank::Two => write!(f, "2"),
            Rank::Three => write!(f, "3"),
            Rank::Four => write!(f, "4"),
            Rank::Five => write!(f, "5"),
            Rank::Six => write!(f, "6"),
            Rank::Seven => write!(f, "7"),
            Rank::Eight => write!(f, "8"),
            Rank::Nine => write!(f, "9"),
            Rank::Ten => write!(f, "10"),
            Rank::Jack => write!(f, "J"),
            Rank::Queen => write!(f, "Q"),
            Rank::King => write!(f, "K"),
            Rank::Ace => write!(f, "A"),
        }
    }
}

impl Serialize for Rank {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.index())
    }
}

impl<'de> Deserialize<'de> for Rank {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let index = u8::deserialize(deserializer)?;
        Rank::from_index(index).ok_or_else(|| de::Error::custom(format!("invalid rank {index}")))
    }
}

/// A playing card. Equality is by (rank, suit); sorting for display goes by
/// rank only, so `Card` deliberately has no `Ord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Card {
    pub rank: Rank,
    pub suit: Suit,
}

impl Card {
    pub fn new(rank: Rank, suit: Suit) -> Self {
        Self { rank, suit }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.rank, self.suit)
    }
}

/// Parses short codes such as `"As"`, `"10h"`, `"Td"` or `"7♣"`.
impl FromStr for Card {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ProtocolError::InvalidCard(s.to_string());
        let suit_char = s.chars().last().ok_or_else(invalid)?;
        let rank_part = &s[..s.len() - suit_char.len_utf8()];

        let suit = match suit_char {
            'c' | 'C' | '♣' => Suit::Clubs,
            'd' | 'D' | '♦' => Suit::Diamonds,
            'h' | 'H' | '♥' => Suit::Hearts,
            's' | 'S' | '♠' => Suit::Spades,
            _ => return Err(invalid()),
        };
        let rank = match rank_part {
            "J" | "j" => Rank::Jack,
            "Q" | "q" => Rank::Queen,
            "K" | "k" => Rank::King,
            "A" | "a" => Rank::Ace,
            "T" | "t" => Rank::Ten,
            digits => digits
                .parse::<u8>()
                .ok()
                .and_then(Rank::from_u8)
                .filter(|r| *r <= Rank::Ten)
                .ok_or_else(invalid)?,
        };
        Ok(Card::new(rank, suit))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HandRank {
    HighCard,
    OnePair,
    TwoPair,
    ThreeOfAKind,
    Straight,
    Flush,
    FullHouse,
    FourOfAKind,
    StraightFlush,
    RoyalFlush,
}

impl fmt::Display for HandRank {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            HandRank::HighCard => "High Card",
            HandRank::OnePair => "One Pair",
            HandRank::TwoPair => "Two Pair",
            HandRank::ThreeOfAKind => "Three Of A Kind",
            HandRank::Straight => "Straight",
            HandRank::Flush => "Flush",
            HandRank::FullHouse => "Full House",
            HandRank::FourOfAKind => "Four Of A Kind",
            HandRank::StraightFlush => "Straight Flush",
            HandRank::RoyalFlush => "Royal Flush",
        };
        write!(f, "{}", name)
    }
}

/// A classified five card hand.
///
/// Hands compare by category first, then by `tiebreakers` entry by entry.
/// The vector's length and meaning depend on the category, so only hands of
/// the same category ever have their tiebreakers compared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hand {
    pub rank: HandRank,
    pub tiebreakers: Vec<Rank>,
}

impl Ord for Hand {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank
            .cmp(&other.rank)
            .then_with(|| self.tiebreakers.cmp(&other.tiebreakers))
    }
}

impl PartialOrd for Hand {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Hand {
    pub fn royal_flush() -> Self {
        Self {
            rank: HandRank::RoyalFlush,
            tiebreakers: Vec::new(),
        }
    }

    pub fn straight_flush(high: Rank) -> Self {
        Self {
            rank: HandRank::StraightFlush,
            tiebreakers: vec![high],
        }
    }

    pub fn four_of_a_kind(quads: Rank, kicker: Rank) -> Self {
        Self {
            rank: HandRank::FourOfAKind,
            tiebreakers: vec![quads, kicker],
        }
    }

    pub fn full_house(trips: Rank, pair: Rank) -> Self {
        Self {
            rank: HandRank::FullHouse,
            tiebreakers: vec![trips, pair],
        }
    }

    pub fn flush(ranks: [Rank; 5]) -> Self {
        Self {
            rank: HandRank::Flush,
            tiebreakers: ranks.to_vec(),
        }
    }

    pub fn straight(high: Rank) -> Self {
        Self {
            rank: HandRank::Straight,
            tiebreakers: vec![high],
        }
    }

    pub fn three_of_a_kind(trips: Rank, kickers: [Rank; 2]) -> Self {
        Self {
            rank: HandRank::ThreeOfAKind,
            tiebreakers: vec![trips, kickers[0], kickers[1]],
        }
    }

    pub fn two_pair(high_pair: Rank, low_pair: Rank, kicker: Rank) -> Self {
        Self {
            rank: HandRank::TwoPair,
            tiebreakers: vec![high_pair, low_pair, kicker],
        }
    }

    pub fn one_pair(pair: Rank, kickers: [Rank; 3]) -> Self {
        Self {
            rank: HandRank::OnePair,
            tiebreakers: vec![pair, kickers[0], kickers[1], kickers[2]],
        }
    }

    pub fn high_card(ranks: [Rank; 5]) -> Self {
        Self {
            rank: HandRank::HighCard,
            tiebreakers: ranks.to_vec(),
        }
    }

    /// Short human readable summary, e.g. "flush, ace high".
    pub fn description(&self) -> String {
        let category = self.rank.to_string().to_lowercase();
        let lead = self.tiebreakers.first().map(|r| r.name().to_lowercase());
        match (self.rank, lead) {
            (HandRank::RoyalFlush, _) | (_, None) => category,
            (HandRank::Straight | HandRank::StraightFlush | HandRank::Flush | HandRank::HighCard, Some(lead)) => {
                format!("{}, {} high", category, lead)
            }
            (HandRank::FullHouse | HandRank::TwoPair, Some(_)) => {
                let joiner = if self.rank == HandRank::FullHouse { "full of" } else { "and" };
                format!(
                    "{}, {} {} {}",
                    category,
                    self.tiebreakers[0].plural().to_lowercase(),
                    joiner,
                    self.tiebreakers[1].plural().to_lowercase()
                )
            }
            (_, Some(_)) => format!("{}, {}", category, self.tiebreakers[0].plural().to_lowercase()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlayerStatus {
    Vacated,
    SittingOut,
    Active,
}

impl fmt::Display for PlayerStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PlayerStatus::Vacated => write!(f, "vacated"),
            PlayerStatus::SittingOut => write!(f, "sitting-out"),
            PlayerStatus::Active => write!(f, "active"),
        }
    }
}

/// Where the table is in the life of a hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stage {
    Waiting,
    Preflop,
    Flop,
    Turn,
    River,
    Showdown,
}

impl Stage {
    /// The stage that follows this one within a hand. `Waiting` and
    /// `Showdown` have no successor inside a hand.
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Preflop => Some(Stage::Flop),
            Stage::Flop => Some(Stage::Turn),
            Stage::Turn => Some(Stage::River),
            Stage::River => Some(Stage::Showdown),
            Stage::Waiting | Stage::Showdown => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Stage::Waiting => write!(f, "Waiting"),
            Stage::Preflop => write!(f, "Preflop"),
            Stage::Flop => write!(f, "Flop"),
            Stage::Turn => write!(f, "Turn"),
            Stage::River => write!(f, "River"),
            Stage::Showdown => write!(f, "Showdown"),
        }
    }
}
