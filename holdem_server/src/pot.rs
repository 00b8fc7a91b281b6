use holdem_protocol::Chips;
use std::collections::BTreeMap;

/// One layer of the pot. Only `players` may win it; `total` also includes
/// chips from folded seats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidePot {
    pub players: Vec<usize>,
    pub total: Chips,
    /// Height of this layer per contributing seat.
    pub cap: Chips,
}

/// Chips put in by each seat over the whole hand, keyed by seat index.
#[derive(Debug, Clone, Default)]
pub struct Pot {
    contributions: BTreeMap<usize, Chips>,
}

impl Pot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, seat: usize, amount: Chips) {
        *self.contributions.entry(seat).or_insert(0) += amount;
    }

    pub fn total(&self) -> Chips {
        self.contributions.values().sum()
    }

    /// Splits the contributions into layers, smallest wager level first.
    ///
    /// Each distinct amount put in by a seat that has not folded closes a
    /// layer. Every contributor, folded or not, pays into a layer up to its
    /// height; only unfolded seats at or above the level are eligible to win
    /// it. Folded chips above the highest live level land in the last layer,
    /// so the layer totals always add up to [`Pot::total`].
    pub fn side_pots(&self, is_folded: impl Fn(usize) -> bool) -> Vec<SidePot> {
        let mut live: Vec<(Chips, usize)> = self
            .contributions
            .iter()
            .filter(|(seat, amount)| **amount > 0 && !is_folded(**seat))
            .map(|(seat, amount)| (*amount, *seat))
            .collect();
        live.sort_unstable();

        let mut levels: Vec<Chips> = live.iter().map(|(amount, _)| *amount).collect();
        levels.dedup();

        let mut pots = Vec::with_capacity(levels.len());
        let mut previous = 0;
        for level in levels {
            let total = self
                .contributions
                .values()
                .map(|&c| c.min(level) - c.min(previous))
                .sum();
            let mut players: Vec<usize> = live
                .iter()
                .filter(|(amount, _)| *amount >= level)
                .map(|(_, seat)| *seat)
                .collect();
            players.sort_unstable();
            pots.push(SidePot {
                players,
                total,
                cap: level - previous,
            });
            previous = level;
        }

        let dead: Chips = self
            .contributions
            .values()
            .map(|&c| c.saturating_sub(previous))
            .sum();
        if dead > 0 {
            match pots.last_mut() {
                Some(last) => last.total += dead,
                None => pots.push(SidePot {
                    players: Vec::new(),
                    total: dead,
                    cap: dead,
                }),
            }
        }
        pots
    }
}

/// Divides `total` between `winners`. Odd chips go one at a time to the
/// winners in the order given.
pub fn split(total: Chips, winners: &[usize]) -> Vec<(usize, Chips)> {
    if winners.is_empty() {
        return Vec::new();
    }
    let count = winners.len() as Chips;
    let share = total / count;
    let remainder = (total % count) as usize;
    winners
        .iter()
        .enumerate()
        .map(|(i, &seat)| (seat, share + Chips::from(i < remainder)))
        .collect()
}
