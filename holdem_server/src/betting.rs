use crate::pot::Pot;
use crate::seats::{Player, SeatRing};
use holdem_protocol::{Chips, ServerError, ServerResult};

/// Wagers for one street.
///
/// `bets` is what each seat has put in on this street only; the pot keeps
/// the running total for the hand. A seat still owes a decision while it
/// can act and has either not acted since the last full raise or is short
/// of the call amount.
#[derive(Debug, Clone)]
pub struct BettingRound {
    bets: Vec<Chips>,
    acted: Vec<bool>,
    call_amount: Chips,
    raise_by: Chips,
    raiser: usize,
}

impl BettingRound {
    pub fn new(closer: usize, call_amount: Chips, min_raise: Chips, seats: usize) -> Self {
        Self {
            bets: vec![0; seats],
            acted: vec![false; seats],
            call_amount,
            raise_by: min_raise,
            raiser: closer,
        }
    }

    pub fn bet(&self, seat: usize) -> Chips {
        self.bets[seat]
    }

    pub fn call_amount(&self) -> Chips {
        self.call_amount
    }

    /// Smallest legal raise increment over the call amount.
    pub fn raise_by(&self) -> Chips {
        self.raise_by
    }

    /// The seat that last made a full raise, or the seat the street opened
    /// around if nobody has.
    pub fn raiser(&self) -> usize {
        self.raiser
    }

    pub fn owed(&self, seat: usize) -> Chips {
        self.call_amount.saturating_sub(self.bets[seat])
    }

    pub fn can_fold(&self, seat: usize, player: &Player) -> bool {
        player.can_act() && self.bets[seat] < self.call_amount
    }

    pub fn can_check(&self, seat: usize, player: &Player) -> bool {
        player.can_act() && self.bets[seat] == self.call_amount
    }

    pub fn can_call(&self, seat: usize, player: &Player) -> bool {
        player.can_act() && self.bets[seat] < self.call_amount
    }

    /// A seat that already acted may only raise again after someone else
    /// makes a full raise. An all-in short of a full raise does not reopen it.
    pub fn can_raise(&self, seat: usize, player: &Player) -> bool {
        player.can_act() && !self.acted[seat] && player.chips > self.owed(seat)
    }

    pub fn has_pending_decision(&self, seat: usize, player: &Player) -> bool {
        player.can_act() && (!self.acted[seat] || self.bets[seat] < self.call_amount)
    }

    /// First seat after `from` (wrapping, `from` itself last) that still owes
    /// a decision. `None` closes the street.
    pub fn next_to_act(&self, from: usize, seats: &SeatRing) -> Option<usize> {
        (1..=seats.len())
            .map(|n| seats.move_by(from, n))
            .find(|&i| self.has_pending_decision(i, seats.get(i)))
    }

    /// Forced bet. A stack smaller than the blind goes all-in for what it has.
    pub fn post_blind(&mut self, seat: usize, player: &mut Player, pot: &mut Pot, amount: Chips) {
        let posted = amount.min(player.chips);
        self.put_in(seat, player, pot, posted);
    }

    pub fn fold(&mut self, seat: usize, player: &mut Player) -> ServerResult<()> {
        if !self.can_fold(seat, player) {
            return Err(ServerError::CannotFold(player.name.clone()));
        }
        player.has_folded = true;
        self.acted[seat] = true;
        Ok(())
    }

    pub fn check(&mut self, seat: usize, player: &Player) -> ServerResult<()> {
        if !self.can_check(seat, player) {
            return Err(ServerError::CannotCheck(player.name.clone()));
        }
        self.acted[seat] = true;
        Ok(())
    }

    /// Matches the call amount, or goes all-in if the stack is short.
    pub fn call(&mut self, seat: usize, player: &mut Player, pot: &mut Pot) -> ServerResult<()> {
        if !self.can_call(seat, player) {
            return Err(ServerError::CannotCall(player.name.clone()));
        }
        let amount = self.owed(seat).min(player.chips);
        self.put_in(seat, player, pot, amount);
        self.acted[seat] = true;
        Ok(())
    }

    /// Raises this seat's total wager for the street to `amount`.
    ///
    /// The target must reach `call_amount + raise_by` unless it puts the
    /// player all-in. Only a full raise moves the closer and makes everyone
    /// else act again.
    pub fn raise(
        &mut self,
        seat: usize,
        player: &mut Player,
        pot: &mut Pot,
        amount: Chips,
    ) -> ServerResult<()> {
        if !self.can_raise(seat, player) {
            return Err(ServerError::CannotRaise(player.name.clone()));
        }
        let all_in = self.bets[seat] + player.chips;
        if amount > all_in {
            return Err(ServerError::RaiseExceedsChips(all_in));
        }
        let full_raise = self.call_amount + self.raise_by;
        if amount < full_raise && amount != all_in {
            return Err(ServerError::RaiseTooSmall(full_raise.min(all_in)));
        }

        let increment = amount - self.call_amount;
        self.put_in(seat, player, pot, amount - self.bets[seat]);
        self.call_amount = amount;
        if increment >= self.raise_by {
            self.raise_by = increment;
            self.raiser = seat;
            self.acted.iter_mut().for_each(|a| *a = false);
        }
        self.acted[seat] = true;
        Ok(())
    }

    fn put_in(&mut self, seat: usize, player: &mut Player, pot: &mut Pot, amount: Chips) {
        player.chips -= amount;
        self.bets[seat] += amount;
        pot.add(seat, amount);
    }
}
