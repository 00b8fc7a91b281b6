use crate::deck::{Deck, DeckError};
use crate::pot::{split, Pot};
use crate::seats::{Player, SeatRing};
use holdem_protocol::{find_winning_hands, Card, Chips, PlayerStatus, Stage, TableView};
use log::{debug, warn};

/// Everything that exists only for the length of one hand: the button and
/// blind positions, the deck, the board and the pot.
#[derive(Debug)]
pub struct Table {
    pub dealer: usize,
    pub small_blind: usize,
    pub big_blind: usize,
    pub min_bet: Chips,
    pub pot: Pot,
    flop: [Option<Card>; 3],
    turn: Option<Card>,
    river: Option<Card>,
    deck: Deck,
}

impl Table {
    pub fn new(dealer: usize, small_blind: usize, big_blind: usize, min_bet: Chips, deck: Deck) -> Self {
        Self {
            dealer,
            small_blind,
            big_blind,
            min_bet,
            pot: Pot::new(),
            flop: [None; 3],
            turn: None,
            river: None,
            deck,
        }
    }

    /// Two cards to every seat dealt into the hand, one at a time, starting
    /// with the small blind.
    pub fn deal_hole_cards(&mut self, seats: &mut SeatRing) -> Result<(), DeckError> {
        for slot in 0..2 {
            for n in 0..seats.len() {
                let seat = seats.move_by(self.small_blind, n);
                let player = seats.get_mut(seat);
                if player.status == PlayerStatus::Active {
                    player.hole_cards[slot] = Some(self.deck.draw()?);
                }
            }
        }
        Ok(())
    }

    /// Deals the community cards that open `stage`.
    pub fn deal_street(&mut self, stage: Stage) -> Result<(), DeckError> {
        match stage {
            Stage::Flop => {
                for card in self.flop.iter_mut() {
                    *card = Some(self.deck.draw()?);
                }
            }
            Stage::Turn => self.turn = Some(self.deck.draw()?),
            Stage::River => self.river = Some(self.deck.draw()?),
            Stage::Waiting | Stage::Preflop | Stage::Showdown => {}
        }
        Ok(())
    }

    pub fn board(&self) -> Vec<Card> {
        self.flop
            .iter()
            .chain([&self.turn, &self.river])
            .flatten()
            .copied()
            .collect()
    }

    pub fn view(&self) -> TableView {
        TableView {
            flop: self.flop,
            turn: self.turn,
            river: self.river,
            pot: self.pot.total(),
        }
    }

    /// The whole pot goes to the last seat standing.
    pub fn award_uncontested(&mut self, winner: usize, seats: &mut SeatRing) -> String {
        let player = seats.get_mut(winner);
        player.chips += self.pot.total();
        format!("{} won the hand.", player.name)
    }

    /// Evaluates every live hand, splits each side pot between its best
    /// hands and pays the winners. Returns one line per payout.
    pub fn showdown(&mut self, seats: &mut SeatRing) -> Vec<String> {
        let board = self.board();
        let pots = self.pot.side_pots(|seat| seats.get(seat).has_folded);
        let mut results = Vec::new();

        for (index, side_pot) in pots.iter().enumerate() {
            let contenders: Vec<(usize, [Card; 7])> = side_pot
                .players
                .iter()
                .filter_map(|&seat| seven_cards(seats.get(seat), &board).map(|cards| (seat, cards)))
                .collect();
            let winners = find_winning_hands(&contenders);
            if winners.is_empty() {
                warn!("No contender for a pot of {} chips", side_pot.total);
                continue;
            }

            let winning_seats: Vec<usize> = winners.iter().map(|(seat, _)| *seat).collect();
            let label = pot_label(index, pots.len());
            for ((seat, amount), (_, hand)) in split(side_pot.total, &winning_seats).into_iter().zip(&winners) {
                let player = seats.get_mut(seat);
                player.chips += amount;
                debug!("Seat {} takes {} from the {}", player.id, amount, label);
                results.push(format!(
                    "{} wins {} chips from the {} with {} ({}).",
                    player.name,
                    amount,
                    label,
                    hand.description(),
                    hole_cards_text(player)
                ));
            }
        }
        results
    }
}

fn seven_cards(player: &Player, board: &[Card]) -> Option<[Card; 7]> {
    let [Some(first), Some(second)] = player.hole_cards else {
        return None;
    };
    match board {
        [a, b, c, d, e] => Some([first, second, *a, *b, *c, *d, *e]),
        _ => None,
    }
}

fn hole_cards_text(player: &Player) -> String {
    player
        .hole_cards
        .iter()
        .flatten()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn pot_label(index: usize, count: usize) -> String {
    match (index, count) {
        (0, _) => "main pot".to_string(),
        (1, 2) => "side pot".to_string(),
        (k, _) => format!("side pot {}", k),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cards(codes: &[&str]) -> Vec<Card> {
        codes.iter().map(|c| c.parse().unwrap()).collect()
    }

    fn seated(stacks: &[Chips]) -> SeatRing {
        let mut seats = SeatRing::new(stacks.len());
        for (i, &chips) in stacks.iter().enumerate() {
            let player = seats.get_mut(i);
            player.name = format!("p{}", i);
            player.chips = chips;
            player.status = PlayerStatus::Active;
        }
        seats
    }

    fn deal_board(table: &mut Table) {
        for stage in [Stage::Flop, Stage::Turn, Stage::River] {
            table.deal_street(stage).unwrap();
        }
    }

    #[test]
    fn test_hole_cards_dealt_round_robin_from_small_blind() {
        let mut seats = seated(&[10, 10, 10]);
        let deck = Deck::from_cards(cards(&["2c", "3c", "4c", "5c", "6c", "7c"]));
        let mut table = Table::new(0, 1, 2, 2, deck);
        table.deal_hole_cards(&mut seats).unwrap();

        assert_eq!(seats.get(1).hole_cards, [Some("2c".parse().unwrap()), Some("5c".parse().unwrap())]);
        assert_eq!(seats.get(2).hole_cards, [Some("3c".parse().unwrap()), Some("6c".parse().unwrap())]);
        assert_eq!(seats.get(0).hole_cards, [Some("4c".parse().unwrap()), Some("7c".parse().unwrap())]);
    }

    #[test]
    fn test_dealing_skips_seats_not_in_hand() {
        let mut seats = seated(&[10, 10, 10]);
        seats.get_mut(1).status = PlayerStatus::SittingOut;
        let deck = Deck::from_cards(cards(&["2c", "3c", "4c", "5c"]));
        let mut table = Table::new(0, 0, 2, 2, deck);
        table.deal_hole_cards(&mut seats).unwrap();
        assert_eq!(seats.get(1).hole_cards, [None, None]);
        assert!(seats.get(2).hole_cards[1].is_some());
    }

    #[test]
    fn test_dealing_past_the_deck_fails() {
        let mut seats = seated(&[10, 10]);
        let deck = Deck::from_cards(cards(&["2c", "3c", "4c"]));
        let mut table = Table::new(0, 0, 1, 2, deck);
        assert_eq!(table.deal_hole_cards(&mut seats), Err(DeckError::Exhausted));
    }

    #[test]
    fn test_showdown_flush_beats_lower_flush() {
        let mut seats = seated(&[0, 0]);
        // Hole cards go 0,1,0,1 then the board.
        let deck = Deck::from_cards(cards(&[
            "Ac", "Kc", "10c", "4c", "Ah", "Jc", "2c", "7c", "Ad",
        ]));
        let mut table = Table::new(0, 0, 1, 2, deck);
        table.deal_hole_cards(&mut seats).unwrap();
        deal_board(&mut table);
        table.pot.add(0, 20);
        table.pot.add(1, 20);

        let results = table.showdown(&mut seats);
        assert_eq!(seats.get(0).chips, 40);
        assert_eq!(seats.get(1).chips, 0);
        assert_eq!(
            results,
            vec!["p0 wins 40 chips from the main pot with flush, ace high (A♣ 10♣).".to_string()]
        );
    }

    #[test]
    fn test_showdown_splits_tied_pot_with_odd_chip() {
        let mut seats = seated(&[0, 0, 0]);
        seats.get_mut(2).has_folded = true;
        // Board plays: a broadway straight for both live hands.
        let deck = Deck::from_cards(cards(&[
            "2c", "3d", "4h", "2d", "3h", "4s", "As", "Kd", "Qh", "Jc", "10s",
        ]));
        let mut table = Table::new(2, 0, 1, 2, deck);
        table.deal_hole_cards(&mut seats).unwrap();
        deal_board(&mut table);
        table.pot.add(0, 10);
        table.pot.add(1, 10);
        table.pot.add(2, 5);

        let results = table.showdown(&mut seats);
        assert_eq!(results.len(), 2);
        assert_eq!(seats.get(0).chips, 13);
        assert_eq!(seats.get(1).chips, 12);
        assert_eq!(seats.get(2).chips, 0);
    }

    #[test]
    fn test_showdown_pays_side_pot_to_covering_player() {
        let mut seats = seated(&[0, 0, 0]);
        // Seat 0 holds aces but was all-in for 10; seat 1 beats seat 2 for the rest.
        let deck = Deck::from_cards(cards(&[
            "Ac", "Kc", "2d", "Ad", "Kd", "3h", "7s", "8s", "Jh", "4c", "9d",
        ]));
        let mut table = Table::new(2, 0, 1, 2, deck);
        table.deal_hole_cards(&mut seats).unwrap();
        deal_board(&mut table);
        table.pot.add(0, 10);
        table.pot.add(1, 30);
        table.pot.add(2, 30);

        let results = table.showdown(&mut seats);
        assert_eq!(seats.get(0).chips, 30);
        assert_eq!(seats.get(1).chips, 40);
        assert_eq!(seats.get(2).chips, 0);
        assert!(results[0].contains("main pot"));
        assert!(results[1].contains("side pot"));
    }

    #[test]
    fn test_award_uncontested() {
        let mut seats = seated(&[5, 5]);
        let mut table = Table::new(0, 0, 1, 2, Deck::from_cards(Vec::new()));
        table.pot.add(0, 1);
        table.pot.add(1, 2);
        assert_eq!(table.award_uncontested(1, &mut seats), "p1 won the hand.");
        assert_eq!(seats.get(1).chips, 8);
    }

    #[test]
    fn test_pot_labels() {
        assert_eq!(pot_label(0, 1), "main pot");
        assert_eq!(pot_label(1, 2), "side pot");
        assert_eq!(pot_label(2, 3), "side pot 2");
    }
}
