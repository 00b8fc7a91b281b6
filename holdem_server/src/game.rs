use crate::betting::BettingRound;
use crate::deck::Deck;
use crate::seats::SeatRing;
use crate::table::Table;
use holdem_protocol::{
    ActionBar, Chips, GameUpdate, PlayerAction, PlayerStatus, PlayerView, ServerError,
    ServerResult, Stage,
};
use log::{debug, info};

/// Table parameters fixed for the life of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableConfig {
    pub seats: usize,
    pub starting_chips: Chips,
    /// The big blind and the smallest opening bet. The small blind is half.
    pub min_bet: Chips,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            seats: 6,
            starting_chips: 100,
            min_bet: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Move {
    Fold,
    Check,
    Call,
    /// Raise to this total for the street.
    Raise(Chips),
}

pub type DeckFactory = Box<dyn FnMut() -> Deck + Send>;

struct HandInProgress {
    table: Table,
    round: BettingRound,
    /// Seat whose decision the table is waiting on.
    turn: usize,
}

/// The single table. Every method runs to completion without blocking, so
/// callers serialize access with one lock.
///
/// Messages meant for everyone at the table (actions taken, cards dealt,
/// showdown results) queue up in order and are collected with
/// [`GameState::drain_announcements`].
pub struct GameState {
    config: TableConfig,
    seats: SeatRing,
    stage: Stage,
    hand: Option<HandInProgress>,
    last_dealer: Option<usize>,
    new_deck: DeckFactory,
    announcements: Vec<String>,
}

impl GameState {
    pub fn new(config: TableConfig) -> Self {
        Self::with_deck_factory(config, Box::new(Deck::shuffled))
    }

    pub(crate) fn with_deck_factory(config: TableConfig, new_deck: DeckFactory) -> Self {
        Self {
            seats: SeatRing::new(config.seats),
            config,
            stage: Stage::Waiting,
            hand: None,
            last_dealer: None,
            new_deck,
            announcements: Vec::new(),
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn seats(&self) -> &SeatRing {
        &self.seats
    }

    pub fn current_turn(&self) -> Option<usize> {
        self.hand.as_ref().map(|h| h.turn)
    }

    pub fn drain_announcements(&mut self) -> Vec<String> {
        std::mem::take(&mut self.announcements)
    }

    /// Seats `name` with a fresh stack. Returns the seat index.
    pub fn take_seat(&mut self, seat_id: &str, name: &str) -> ServerResult<usize> {
        let seat = self
            .seats
            .find(seat_id)
            .ok_or_else(|| ServerError::InvalidSeat(seat_id.to_string()))?;
        let player = self.seats.get_mut(seat);
        if player.status != PlayerStatus::Vacated {
            return Err(ServerError::SeatTaken);
        }
        player.name = name.to_string();
        player.chips = self.config.starting_chips;
        player.status = PlayerStatus::SittingOut;
        player.is_human = true;
        info!("{} took seat {}", name, seat_id);

        if self.stage == Stage::Waiting {
            self.start_new_hand()?;
        }
        Ok(seat)
    }

    pub fn act(&mut self, seat: usize, action: Move) -> ServerResult<()> {
        self.apply(seat, action)?;
        self.advance()
    }

    /// The connection owning `seat` is gone. Outside a hand the seat is
    /// freed at once; inside one the table plays it until the hand ends.
    pub fn leave(&mut self, seat: usize) -> ServerResult<()> {
        let player = self.seats.get_mut(seat);
        if self.hand.is_none() || player.status != PlayerStatus::Active {
            info!("{} left seat {}", player.name, player.id);
            player.vacate();
            return Ok(());
        }

        info!("{} disconnected mid-hand, seat {} plays itself out", player.name, player.id);
        player.is_human = false;
        if self.current_turn() == Some(seat) {
            let action = self.automatic_move(seat);
            self.apply(seat, action)?;
            self.advance()?;
        }
        Ok(())
    }

    /// Deals a new hand if at least two seated players have chips, otherwise
    /// parks the table in `Waiting`.
    pub fn start_new_hand(&mut self) -> ServerResult<()> {
        self.begin_hand()?;
        self.advance()
    }

    fn begin_hand(&mut self) -> ServerResult<()> {
        self.hand = None;
        for player in self.seats.iter_mut() {
            player.clear_hand();
            if !player.is_human {
                player.vacate();
            }
            if player.status != PlayerStatus::Vacated {
                player.status = if player.chips > 0 {
                    PlayerStatus::Active
                } else {
                    PlayerStatus::SittingOut
                };
            }
        }

        let active = self.seats.count_by_status(PlayerStatus::Active);
        let from = self.last_dealer.unwrap_or(self.seats.len() - 1);
        let dealer = match self.seats.next_active_seat(from) {
            Some(dealer) if active >= 2 => dealer,
            _ => {
                debug!("{} active players, waiting for more", active);
                for player in self.seats.iter_mut() {
                    if player.status == PlayerStatus::Active {
                        player.status = PlayerStatus::SittingOut;
                    }
                }
                self.stage = Stage::Waiting;
                return Ok(());
            }
        };
        let small_blind = if active == 2 {
            dealer
        } else {
            self.seats.next_active_seat(dealer).unwrap_or(dealer)
        };
        let big_blind = self.seats.next_active_seat(small_blind).unwrap_or(dealer);
        info!(
            "Starting hand: dealer {}, small blind {}, big blind {}",
            self.seats.get(dealer).id,
            self.seats.get(small_blind).id,
            self.seats.get(big_blind).id
        );
        self.announcements.push("Starting new hand.".to_string());

        let min_bet = self.config.min_bet;
        let mut table = Table::new(dealer, small_blind, big_blind, min_bet, (self.new_deck)());
        table.deal_hole_cards(&mut self.seats)?;

        let mut round = BettingRound::new(big_blind, min_bet, min_bet, self.seats.len());
        round.post_blind(small_blind, self.seats.get_mut(small_blind), &mut table.pot, min_bet / 2);
        round.post_blind(big_blind, self.seats.get_mut(big_blind), &mut table.pot, min_bet);

        self.last_dealer = Some(dealer);
        self.stage = Stage::Preflop;
        self.hand = Some(HandInProgress {
            table,
            round,
            turn: big_blind,
        });
        Ok(())
    }

    /// Validates and applies one decision. Nothing changes on error.
    fn apply(&mut self, seat: usize, action: Move) -> ServerResult<()> {
        let hand = self.hand.as_mut().ok_or(ServerError::NoHandInProgress)?;
        if hand.turn != seat {
            return Err(ServerError::NotYourTurn);
        }
        let player = self.seats.get_mut(seat);
        let HandInProgress { table, round, .. } = hand;

        let message = match action {
            Move::Fold => {
                round.fold(seat, player)?;
                format!("{} folds.", player.name)
            }
            Move::Check => {
                round.check(seat, player)?;
                format!("{} checks.", player.name)
            }
            Move::Call => {
                round.call(seat, player, &mut table.pot)?;
                format!("{} calls.", player.name)
            }
            Move::Raise(amount) => {
                round.raise(seat, player, &mut table.pot, amount)?;
                format!("{} raises to {}.", player.name, amount)
            }
        };
        debug!("Seat {}: {}", player.id, message);
        self.announcements.push(message);
        Ok(())
    }

    /// Moves the hand forward until a connected player has to decide or the
    /// table runs out of players.
    fn advance(&mut self) -> ServerResult<()> {
        loop {
            let Some(hand) = self.hand.as_mut() else {
                return Ok(());
            };
            let seats = &self.seats;

            let uncontested = (0..seats.len())
                .find(|&i| seats.get(i).in_hand())
                .filter(|&i| seats.has_everyone_folded_except(i));
            if let Some(winner) = uncontested {
                let message = hand.table.award_uncontested(winner, &mut self.seats);
                self.announcements.push(message);
                self.begin_hand()?;
                continue;
            }

            // At most one seat can still put chips in.
            let first_able = (0..seats.len()).find(|&i| seats.get(i).can_act());
            let lone_actor =
                first_able.map_or(true, |i| seats.has_everyone_folded_or_all_in_except(i));
            let betting_over =
                lone_actor && first_able.map_or(true, |i| hand.round.owed(i) == 0);

            if !betting_over {
                if let Some(next) = hand.round.next_to_act(hand.turn, seats) {
                    hand.turn = next;
                    if seats.get(next).is_human {
                        return Ok(());
                    }
                    let action = self.automatic_move(next);
                    self.apply(next, action)?;
                    continue;
                }
            }

            if lone_actor {
                self.run_out()?;
            } else {
                self.next_street()?;
            }
        }
    }

    /// What the table does for a disconnected player.
    fn automatic_move(&self, seat: usize) -> Move {
        match &self.hand {
            Some(hand) if hand.round.can_fold(seat, self.seats.get(seat)) => Move::Fold,
            _ => Move::Check,
        }
    }

    fn next_street(&mut self) -> ServerResult<()> {
        let Some(stage) = self.stage.next() else {
            return Ok(());
        };
        if stage == Stage::Showdown {
            return self.showdown();
        }
        let Some(hand) = self.hand.as_mut() else {
            return Ok(());
        };

        hand.table.deal_street(stage)?;
        let dealer = hand.table.dealer;
        let closer = self.seats.next_active_seat(dealer).unwrap_or(dealer);
        hand.round = BettingRound::new(closer, 0, hand.table.min_bet, self.seats.len());
        hand.turn = dealer;
        self.stage = stage;
        self.announce_street(stage);
        Ok(())
    }

    /// Nobody can bet any more: deal the rest of the board and show down.
    fn run_out(&mut self) -> ServerResult<()> {
        while let Some(stage) = self.stage.next().filter(|s| *s != Stage::Showdown) {
            if let Some(hand) = self.hand.as_mut() {
                hand.table.deal_street(stage)?;
            }
            self.stage = stage;
            self.announce_street(stage);
        }
        self.showdown()
    }

    fn showdown(&mut self) -> ServerResult<()> {
        self.stage = Stage::Showdown;
        if let Some(hand) = self.hand.as_mut() {
            let results = hand.table.showdown(&mut self.seats);
            self.announcements.extend(results);
        }
        self.begin_hand()
    }

    fn announce_street(&mut self, stage: Stage) {
        self.announcements
            .push(format!("Dealing {}.", stage.to_string().to_lowercase()));
    }

    /// The table as `viewer` may see it. Only the viewer's own hole cards
    /// are included.
    pub fn snapshot(&self, viewer: Option<usize>) -> GameUpdate {
        let hand = self.hand.as_ref();
        let players = self
            .seats
            .iter()
            .enumerate()
            .map(|(i, p)| PlayerView {
                id: p.id.clone(),
                name: p.name.clone(),
                chips: p.chips,
                chips_in_pot: hand
                    .filter(|_| p.status == PlayerStatus::Active)
                    .map(|h| h.round.bet(i)),
                has_folded: p.has_folded,
                hole_cards: if viewer == Some(i) {
                    p.hole_cards
                } else {
                    [None, None]
                },
                is_active: hand.map_or(false, |h| h.turn == i),
                is_dealer: hand.map_or(false, |h| h.table.dealer == i),
                status: p.status,
            })
            .collect();

        GameUpdate {
            action_bar: self.action_bar(viewer),
            players,
            stage: self.stage,
            table: hand.map(|h| h.table.view()).unwrap_or_default(),
        }
    }

    fn action_bar(&self, viewer: Option<usize>) -> ActionBar {
        let Some(hand) = self.hand.as_ref() else {
            return ActionBar::default();
        };
        let seat = hand.turn;
        let player = self.seats.get(seat);
        let round = &hand.round;

        let mut actions = Vec::new();
        if viewer == Some(seat) {
            if round.can_fold(seat, player) {
                actions.push(PlayerAction::Fold);
            }
            if round.can_check(seat, player) {
                actions.push(PlayerAction::Check);
            }
            if round.can_call(seat, player) {
                actions.push(PlayerAction::Call);
            }
            if round.can_raise(seat, player) {
                actions.push(PlayerAction::Raise);
            }
        }

        let max_raise = player.chips.saturating_sub(round.owed(seat));
        ActionBar {
            actions,
            call_amount: round.call_amount(),
            chips_in_pot: round.bet(seat),
            min_raise_amount: round.raise_by().min(max_raise),
            max_raise_amount: max_raise,
            total_chips: player.chips,
            seat_id: Some(player.id.clone()),
        }
    }
}
