//! Hand classification and comparison.
//!
//! A player's hand is the best five card subset of their seven available
//! cards (two hole cards plus five community cards). Every one of the
//! C(7,5) = 21 subsets is classified with [`check_hand`] and the strongest
//! one wins.

use crate::types::{Card, Hand, Rank};
use std::cmp::Ordering;

/// Detectors ordered strongest to weakest; the first one that matches wins.
const DETECTORS: [fn(&[Card; 5]) -> Option<Hand>; 9] = [
    is_royal_flush,
    is_straight_flush,
    is_four_of_a_kind,
    is_full_house,
    is_flush,
    is_straight,
    is_three_of_a_kind,
    is_two_pair,
    is_one_pair,
];

/// Classifies exactly five cards.
pub fn check_hand(cards: &[Card; 5]) -> Hand {
    DETECTORS
        .iter()
        .find_map(|detect| detect(cards))
        .unwrap_or_else(|| high_card(cards))
}

/// Best hand out of seven cards, found by trying all 21 five card subsets.
pub fn best_hand(cards: &[Card; 7]) -> Hand {
    let mut best = check_hand(&[cards[0], cards[1], cards[2], cards[3], cards[4]]);
    for combo in five_card_combinations(cards).iter().skip(1) {
        let hand = check_hand(combo);
        if hand > best {
            best = hand;
        }
    }
    best
}

pub fn compare(a: &Hand, b: &Hand) -> Ordering {
    a.cmp(b)
}

/// All 21 ways of picking five cards out of seven, in a fixed order. The
/// first entry is always the first five cards.
pub fn five_card_combinations(cards: &[Card; 7]) -> Vec<[Card; 5]> {
    let mut combos = Vec::with_capacity(21);
    // Choose the two cards to leave out, last pair first so the first combo
    // keeps cards 0..5.
    for skip_a in (0..7).rev() {
        for skip_b in (skip_a + 1..7).rev() {
            let mut combo = [cards[0]; 5];
            let kept = cards
                .iter()
                .enumerate()
                .filter(|&(i, _)| i != skip_a && i != skip_b)
                .map(|(_, c)| *c);
            for (slot, card) in combo.iter_mut().zip(kept) {
                *slot = card;
            }
            combos.push(combo);
        }
    }
    combos
}

/// Evaluates every contender and returns all of those tied for the best
/// hand, in the order they were given.
pub fn find_winning_hands<K: Clone>(contenders: &[(K, [Card; 7])]) -> Vec<(K, Hand)> {
    let mut winners: Vec<(K, Hand)> = Vec::new();
    for (key, cards) in contenders {
        let hand = best_hand(cards);
        let ordering = winners
            .first()
            .map(|(_, best)| hand.cmp(best))
            .unwrap_or(Ordering::Greater);
        match ordering {
            Ordering::Greater => winners = vec![(key.clone(), hand)],
            Ordering::Equal => winners.push((key.clone(), hand)),
            Ordering::Less => {}
        }
    }
    winners
}

fn ranks_descending(cards: &[Card; 5]) -> [Rank; 5] {
    let mut ranks = cards.map(|c| c.rank);
    ranks.sort_by(|a, b| b.cmp(a));
    ranks
}

/// (count, rank) pairs sorted by count, then rank, both descending. Ordering
/// never depends on the order the cards came in.
fn rank_groups(cards: &[Card; 5]) -> Vec<(usize, Rank)> {
    let mut counts = [0usize; 15];
    for card in cards {
        counts[card.rank as usize] += 1;
    }
    let mut groups: Vec<(usize, Rank)> = Rank::ALL
        .iter()
        .filter(|&&r| counts[r as usize] > 0)
        .map(|&r| (counts[r as usize], r))
        .collect();
    groups.sort_by(|a, b| b.cmp(a));
    groups
}

fn group_counts(groups: &[(usize, Rank)]) -> Vec<usize> {
    groups.iter().map(|&(count, _)| count).collect()
}

fn is_suited(cards: &[Card; 5]) -> bool {
    cards.iter().all(|c| c.suit == cards[0].suit)
}

/// High card of a straight, treating A-2-3-4-5 as five high.
fn straight_high(cards: &[Card; 5]) -> Option<Rank> {
    let ranks = ranks_descending(cards);
    let distinct = ranks.windows(2).all(|w| w[0] != w[1]);
    if !distinct {
        return None;
    }
    if ranks[0] as u8 - ranks[4] as u8 == 4 {
        return Some(ranks[0]);
    }
    if ranks == [Rank::Ace, Rank::Five, Rank::Four, Rank::Three, Rank::Two] {
        return Some(Rank::Five);
    }
    None
}

fn is_royal_flush(cards: &[Card; 5]) -> Option<Hand> {
    is_straight_flush(cards)
        .filter(|hand| hand.tiebreakers.first() == Some(&Rank::Ace))
        .map(|_| Hand::royal_flush())
}

fn is_straight_flush(cards: &[Card; 5]) -> Option<Hand> {
    if !is_suited(cards) {
        return None;
    }
    straight_high(cards).map(Hand::straight_flush)
}

fn is_four_of_a_kind(cards: &[Card; 5]) -> Option<Hand> {
    let groups = rank_groups(cards);
    match group_counts(&groups).as_slice() {
        [4, 1] => Some(Hand::four_of_a_kind(groups[0].1, groups[1].1)),
        _ => None,
    }
}

fn is_full_house(cards: &[Card; 5]) -> Option<Hand> {
    let groups = rank_groups(cards);
    match group_counts(&groups).as_slice() {
        [3, 2] => Some(Hand::full_house(groups[0].1, groups[1].1)),
        _ => None,
    }
}

fn is_flush(cards: &[Card; 5]) -> Option<Hand> {
    is_suited(cards).then(|| Hand::flush(ranks_descending(cards)))
}

fn is_straight(cards: &[Card; 5]) -> Option<Hand> {
    straight_high(cards).map(Hand::straight)
}

fn is_three_of_a_kind(cards: &[Card; 5]) -> Option<Hand> {
    let groups = rank_groups(cards);
    match group_counts(&groups).as_slice() {
        [3, 1, 1] => Some(Hand::three_of_a_kind(
            groups[0].1,
            [groups[1].1, groups[2].1],
        )),
        _ => None,
    }
}

fn is_two_pair(cards: &[Card; 5]) -> Option<Hand> {
    let groups = rank_groups(cards);
    match group_counts(&groups).as_slice() {
        [2, 2, 1] => Some(Hand::two_pair(groups[0].1, groups[1].1, groups[2].1)),
        _ => None,
    }
}

fn is_one_pair(cards: &[Card; 5]) -> Option<Hand> {
    let groups = rank_groups(cards);
    match group_counts(&groups).as_slice() {
        [2, 1, 1, 1] => Some(Hand::one_pair(
            groups[0].1,
            [groups[1].1, groups[2].1, groups[3].1],
        )),
        _ => None,
    }
}

fn high_card(cards: &[Card; 5]) -> Hand {
    Hand::high_card(ranks_descending(cards))
}
