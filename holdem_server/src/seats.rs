use holdem_protocol::{Card, Chips, PlayerStatus};

/// The occupant of one seat.
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    /// Stable seat identifier, "1" for the first seat.
    pub id: String,
    pub name: String,
    pub chips: Chips,
    pub has_folded: bool,
    pub hole_cards: [Option<Card>; 2],
    pub status: PlayerStatus,
    /// False once the owning connection has gone away mid-hand. The table
    /// then acts for this seat.
    pub is_human: bool,
}

impl Player {
    pub fn vacant(id: String) -> Self {
        Self {
            id,
            name: String::new(),
            chips: 0,
            has_folded: false,
            hole_cards: [None, None],
            status: PlayerStatus::Vacated,
            is_human: true,
        }
    }

    /// Active, still holding cards, and with chips behind.
    pub fn can_act(&self) -> bool {
        self.status == PlayerStatus::Active && !self.has_folded && self.chips > 0
    }

    /// Dealt into the current hand and not folded. All-in players count.
    pub fn in_hand(&self) -> bool {
        self.status == PlayerStatus::Active && !self.has_folded
    }

    pub fn clear_hand(&mut self) {
        self.has_folded = false;
        self.hole_cards = [None, None];
    }

    pub fn vacate(&mut self) {
        *self = Player::vacant(std::mem::take(&mut self.id));
    }
}

/// Fixed-size circular seating. Seats are addressed by index; rotation is
/// index arithmetic modulo the table size.
#[derive(Debug, Clone)]
pub struct SeatRing {
    players: Vec<Player>,
}

impl SeatRing {
    pub fn new(seats: usize) -> Self {
        let players = (1..=seats)
            .map(|n| Player::vacant(n.to_string()))
            .collect();
        Self { players }
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn next(&self, seat: usize) -> usize {
        self.move_by(seat, 1)
    }

    pub fn move_by(&self, seat: usize, n: usize) -> usize {
        (seat + n) % self.len()
    }

    pub fn get(&self, seat: usize) -> &Player {
        &self.players[seat]
    }

    pub fn get_mut(&mut self, seat: usize) -> &mut Player {
        &mut self.players[seat]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        self.players.iter_mut()
    }

    /// Index of the seat with the given wire id.
    pub fn find(&self, seat_id: &str) -> Option<usize> {
        self.players.iter().position(|p| p.id == seat_id)
    }

    pub fn count_by_status(&self, status: PlayerStatus) -> usize {
        self.players.iter().filter(|p| p.status == status).count()
    }

    /// The first seat after `seat` (wrapping, never `seat` itself) whose
    /// player can still act. `None` means nobody else can.
    pub fn next_active_seat(&self, seat: usize) -> Option<usize> {
        std::iter::successors(Some(self.next(seat)), |&i| Some(self.next(i)))
            .take(self.len() - 1)
            .find(|&i| self.players[i].can_act())
    }

    pub fn has_everyone_folded_except(&self, seat: usize) -> bool {
        self.others(seat)
            .filter(|p| p.status == PlayerStatus::Active)
            .all(|p| p.has_folded)
    }

    pub fn has_everyone_folded_or_all_in_except(&self, seat: usize) -> bool {
        self.others(seat)
            .filter(|p| p.status == PlayerStatus::Active)
            .all(|p| p.has_folded || p.chips == 0)
    }

    fn others(&self, seat: usize) -> impl Iterator<Item = &Player> {
        self.players
            .iter()
            .enumerate()
            .filter(move |(i, _)| *i != seat)
            .map(|(_, p)| p)
    }
}
