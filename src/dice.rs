//! # Dice 100 — Push-Your-Luck Scoring
//!
//! The player rolls one die per action. Every face except the losing face (1)
//! adds to the unbanked `accumulated` score; the losing face wipes it. Banking
//! moves the accumulated score into `saved` at a fixed cost. The game is won
//! as soon as `accumulated + saved` reaches 100.
//!
//! `points` is the competition ledger: losses and bank fees are subtracted as
//! they happen (it may go negative mid-game), a 100 point bonus is added on
//! winning, and only then is it clamped at zero.
//!
//! A [`DiceGame`] is a plain value. Whoever hosts it (one per session) owns
//! persistence and serialization of concurrent access.

use rand::rngs::ThreadRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const LOSING_FACE: u8 = 1;
pub const WINNING_SCORE: u32 = 100;
pub const WIN_BONUS: i32 = 100;
pub const BANK_COST: i32 = 5;

/// Source of die faces in `1..=6`.
pub trait Die {
    fn roll(&mut self) -> u8;
}

/// Fair six-sided die.
pub struct RandomDie<R = ThreadRng> {
    rng: R,
}

impl RandomDie {
    pub fn new() -> Self {
        Self { rng: rand::rng() }
    }
}

impl Default for RandomDie {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> RandomDie<R> {
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: Rng> Die for RandomDie<R> {
    fn roll(&mut self) -> u8 {
        self.rng.random_range(1..=6)
    }
}

/// Who is playing; only members may enter the competition scoreboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Player<'a> {
    Guest,
    Member(&'a str),
}

impl<'a> Player<'a> {
    pub fn from_acronym(acronym: Option<&'a str>) -> Self {
        match acronym {
            Some(a) => Player::Member(a),
            None => Player::Guest,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceGame {
    accumulated: u32,
    saved: u32,
    points: i32,
    has_won: bool,
    message: Option<String>,
    last_face: Option<u8>,
}

impl DiceGame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Roll `die` and apply the face. Returns the face, or `None` once the game is won.
    pub fn roll<D: Die + ?Sized>(&mut self, die: &mut D, player: Player<'_>) -> Option<u8> {
        if self.has_won {
            return None;
        }
        let face = die.roll();
        self.apply_face(face, player).then_some(face)
    }

    /// Apply an already drawn face. Ignored when won or when `face` is not in `1..=6`.
    pub fn apply_face(&mut self, face: u8, player: Player<'_>) -> bool {
        if self.has_won || !(1..=6).contains(&face) {
            return false;
        }
        self.message = None;
        self.last_face = Some(face);

        if face == LOSING_FACE {
            self.points -= self.accumulated as i32;
            self.accumulated = 0;
            self.message =
                Some("You rolled a one and lost every point you had not banked!".to_string());
        } else {
            self.accumulated += u32::from(face);
            if self.accumulated + self.saved >= WINNING_SCORE {
                self.finish(player);
            }
        }
        true
    }

    fn finish(&mut self, player: Player<'_>) {
        self.has_won = true;
        self.points = (self.points + WIN_BONUS).max(0);
        self.message = Some(match player {
            Player::Member(_) => format!(
                "You scored {} points. Save them to the scoreboard to enter the competition!",
                self.points
            ),
            Player::Guest => format!("You scored {} points!", self.points),
        });
    }

    /// Bank the accumulated score for a fee.
    ///
    /// No-op returning `false` after a win or with nothing accumulated.
    pub fn bank_score(&mut self) -> bool {
        if self.has_won || self.accumulated == 0 {
            return false;
        }
        self.saved += self.accumulated;
        self.accumulated = 0;
        self.points -= BANK_COST;
        true
    }

    pub fn new_game(&mut self) {
        *self = Self::default();
    }

    pub fn accumulated(&self) -> u32 {
        self.accumulated
    }

    pub fn saved(&self) -> u32 {
        self.saved
    }

    /// Running ledger; the final score once [`has_finished`](Self::has_finished).
    pub fn points(&self) -> i32 {
        self.points
    }

    pub fn has_finished(&self) -> bool {
        self.has_won
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn last_face(&self) -> Option<u8> {
        self.last_face
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    struct Loaded(Vec<u8>);

    impl Die for Loaded {
        fn roll(&mut self) -> u8 {
            self.0.remove(0)
        }
    }

    fn play(faces: &[u8]) -> DiceGame {
        let mut game = DiceGame::new();
        let mut die = Loaded(faces.to_vec());
        for _ in faces {
            game.roll(&mut die, Player::Guest);
        }
        game
    }

    #[test]
    fn new_game_starts_at_zero() {
        let game = DiceGame::new();
        assert_eq!(game.accumulated(), 0);
        assert_eq!(game.saved(), 0);
        assert_eq!(game.points(), 0);
        assert!(!game.has_finished());
        assert_eq!(game.message(), None);
        assert_eq!(game.last_face(), None);
    }

    #[test]
    fn losing_face_forfeits_accumulated_points() {
        let game = play(&[3, 4, 1, 6]);
        assert_eq!(game.accumulated(), 6);
        assert_eq!(game.saved(), 0);
        assert_eq!(game.points(), -7);
        assert!(!game.has_finished());
    }

    #[test]
    fn loss_message_is_cleared_by_next_roll() {
        let mut game = DiceGame::new();
        game.apply_face(1, Player::Guest);
        assert!(game.message().unwrap().contains("one"));
        game.apply_face(4, Player::Guest);
        assert_eq!(game.message(), None);
        assert_eq!(game.last_face(), Some(4));
    }

    #[test]
    fn reaching_one_hundred_wins_with_bonus() {
        let mut game = DiceGame::new();
        for _ in 0..19 {
            game.apply_face(5, Player::Guest);
        }
        assert_eq!(game.accumulated(), 95);
        assert!(!game.has_finished());

        game.apply_face(5, Player::Guest);
        assert!(game.has_finished());
        assert_eq!(game.points(), 100);
        assert_eq!(game.message(), Some("You scored 100 points!"));
    }

    #[test]
    fn member_win_message_invites_to_scoreboard() {
        let mut game = DiceGame::new();
        for _ in 0..17 {
            game.apply_face(6, Player::Member("doe"));
        }
        assert!(game.has_finished());
        assert!(game.message().unwrap().contains("scoreboard"));
    }

    #[test]
    fn final_points_are_clamped_at_zero() {
        let mut game = DiceGame::new();
        // Lose 6 points 20 times: -120 before the bonus.
        for _ in 0..20 {
            game.apply_face(6, Player::Guest);
            game.apply_face(1, Player::Guest);
        }
        assert_eq!(game.points(), -120);
        for _ in 0..17 {
            game.apply_face(6, Player::Guest);
        }
        assert!(game.has_finished());
        assert_eq!(game.points(), 0);
    }

    #[test]
    fn banking_moves_score_and_charges_fee() {
        let mut game = DiceGame::new();
        for face in [5, 5, 5, 5, 5, 5] {
            game.apply_face(face, Player::Guest);
        }
        assert!(game.bank_score());
        for face in [6, 6, 4, 4] {
            game.apply_face(face, Player::Guest);
        }
        assert_eq!((game.accumulated(), game.saved()), (20, 30));
        let before = game.points();

        assert!(game.bank_score());
        assert_eq!(game.accumulated(), 0);
        assert_eq!(game.saved(), 50);
        assert_eq!(game.points(), before - BANK_COST);
    }

    #[test]
    fn banking_nothing_is_a_no_op() {
        let mut game = DiceGame::new();
        assert!(!game.bank_score());
        assert_eq!(game.points(), 0);
    }

    #[test]
    fn game_is_frozen_once_won() {
        let mut game = DiceGame::new();
        for _ in 0..17 {
            game.apply_face(6, Player::Guest);
        }
        let won = game.clone();

        assert!(!game.bank_score());
        assert_eq!(game.roll(&mut Loaded(vec![1]), Player::Guest), None);
        assert!(!game.apply_face(1, Player::Guest));
        assert_eq!(game, won);
    }

    #[test]
    fn out_of_range_faces_are_ignored() {
        let mut game = DiceGame::new();
        assert!(!game.apply_face(0, Player::Guest));
        assert!(!game.apply_face(7, Player::Guest));
        assert_eq!(game, DiceGame::new());
    }

    #[test]
    fn new_game_resets_everything() {
        let mut game = play(&[6, 6, 1, 5]);
        game.bank_score();
        game.new_game();
        assert_eq!(game, DiceGame::new());
    }

    #[test]
    fn random_die_stays_in_range() {
        let mut die = RandomDie::with_rng(StdRng::seed_from_u64(7));
        for _ in 0..1000 {
            let face = die.roll();
            assert!((1..=6).contains(&face));
        }
    }

    #[test]
    fn game_round_trips_through_json() {
        let game = play(&[3, 4]);
        let json = serde_json::to_string(&game).unwrap();
        let back: DiceGame = serde_json::from_str(&json).unwrap();
        assert_eq!(back, game);
    }
}
