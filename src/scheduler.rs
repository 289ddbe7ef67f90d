// Copyright 2025 Fernando Borretti
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The memory model: how a review changes a card's difficulty and stability,
//! when the card is next due, and how urgent a due card is.

use std::cmp::Ordering;

use crate::types::card::Card;
use crate::types::card::CardState;
use crate::types::quality::ReviewQuality;
use crate::types::timestamp::MILLIS_PER_DAY;
use crate::types::timestamp::Timestamp;

pub const MIN_DIFFICULTY: f64 = 0.1;
pub const MAX_DIFFICULTY: f64 = 0.9;
pub const MIN_STABILITY: f64 = 0.4;
pub const INITIAL_STABILITY: f64 = 2.4;
pub const INITIAL_DIFFICULTY: f64 = 0.3;
pub const INITIAL_EASE_FACTOR: f64 = 2.5;

/// The minimum review interval in days.
const MIN_INTERVAL: f64 = 1.0;

/// The maximum review interval in days, about a century.
const MAX_INTERVAL: f64 = 36_500.0;

/// The outcome of reviewing a card.
#[derive(Clone, Debug)]
pub struct ReviewResult {
    /// The card with its new state. The input card is left untouched.
    pub card: Card,
    pub quality: ReviewQuality,
    pub reviewed_at: Timestamp,
    /// Equal to `card.state.due_date`.
    pub next_review: Timestamp,
}

/// The priors for a card that has never been reviewed.
pub fn create_initial_card_state(now: Timestamp) -> CardState {
    CardState {
        difficulty: INITIAL_DIFFICULTY,
        stability: INITIAL_STABILITY,
        last_review: now,
        due_date: now,
        review_count: 0,
        ease_factor: INITIAL_EASE_FACTOR,
    }
}

/// Grades 0-1 make a card harder, grades 4-5 make it easier.
fn new_difficulty(difficulty: f64, quality: ReviewQuality) -> f64 {
    let q = quality.as_f64();
    let difficulty = if quality.value() <= 1 {
        difficulty + (2.0 - q) * 0.15
    } else if quality.value() >= 4 {
        difficulty - (q - 3.0) * 0.1
    } else {
        difficulty
    };
    difficulty.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY)
}

fn new_stability(
    stability: f64,
    difficulty: f64,
    quality: ReviewQuality,
    review_count: u32,
) -> f64 {
    let q = quality.as_f64();
    if review_count == 0 {
        return if quality.is_correct() {
            INITIAL_STABILITY * (1.0 + (q - 3.0) * 0.2)
        } else {
            MIN_STABILITY
        };
    }
    let stability = if quality.is_correct() {
        let factor = 1.0 + (q - 3.0) * 0.15;
        stability * factor * (1.0 + (1.0 - difficulty))
    } else if quality.value() == 2 {
        stability * 1.2
    } else {
        // A lapse discards everything accumulated so far.
        MIN_STABILITY
    };
    stability.max(MIN_STABILITY)
}

/// Interval in whole days. `f64::round` rounds half away from zero.
fn interval(stability: f64, difficulty: f64) -> i64 {
    (stability * (1.0 + difficulty))
        .round()
        .clamp(MIN_INTERVAL, MAX_INTERVAL) as i64
}

/// Apply a review to a card, producing a new card and its next due date.
pub fn update_card_state(
    card: &Card,
    quality: ReviewQuality,
    reviewed_at: Timestamp,
) -> ReviewResult {
    let state = &card.state;
    let difficulty = new_difficulty(state.difficulty, quality);
    let stability = new_stability(state.stability, difficulty, quality, state.review_count);
    let days = interval(stability, difficulty);
    let next_review = reviewed_at.plus_days(days);
    let new_state = CardState {
        difficulty,
        stability,
        last_review: reviewed_at,
        due_date: next_review,
        review_count: state.review_count + 1,
        ease_factor: state.ease_factor,
    };
    ReviewResult {
        card: card.with_state(new_state),
        quality,
        reviewed_at,
        next_review,
    }
}

pub fn is_card_due(card: &Card, now: Timestamp) -> bool {
    card.state.due_date <= now
}

/// Whole days until the card is due, rounded. Negative when overdue.
pub fn days_until_due(card: &Card, now: Timestamp) -> i64 {
    let millis = now.millis_until(card.state.due_date);
    (millis as f64 / MILLIS_PER_DAY as f64).round() as i64
}

/// Higher is more urgent. Every due card scores above every card that is
/// not yet due. Among due cards, days overdue dominate and lower stability
/// breaks ties.
pub fn card_priority(card: &Card, now: Timestamp) -> f64 {
    let days = days_until_due(card, now);
    if !is_card_due(card, now) {
        return -(days as f64);
    }
    let days_overdue = -days as f64;
    let stability_factor = 1.0 / (card.state.stability + 1.0);
    days_overdue * 100.0 + stability_factor * 10.0
}

/// Most urgent first. The sort is stable and the input is not modified.
pub fn sort_cards_by_priority(cards: &[Card], now: Timestamp) -> Vec<Card> {
    let mut keyed: Vec<(f64, &Card)> = cards
        .iter()
        .map(|card| (card_priority(card, now), card))
        .collect();
    keyed.sort_by(|(a, _), (b, _)| b.partial_cmp(a).unwrap_or(Ordering::Equal));
    keyed.into_iter().map(|(_, card)| card.clone()).collect()
}

pub fn due_cards(cards: &[Card], now: Timestamp) -> Vec<Card> {
    cards
        .iter()
        .filter(|card| is_card_due(card, now))
        .cloned()
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::types::card_id::CardId;

    pub(crate) const NOW: i64 = 1_750_000_000_000;

    pub(crate) fn now() -> Timestamp {
        Timestamp::from_millis(NOW).unwrap()
    }

    /// A new card called `id`, created at `NOW`.
    pub(crate) fn card(id: &str) -> Card {
        let mut card = Card::new(id, id, BTreeSet::new(), now());
        card.id = CardId::new(id);
        card
    }

    /// A card with `reviews` completed reviews, due `days` days from `NOW`.
    pub(crate) fn reviewed_card(id: &str, reviews: u32, days: f64, stability: f64) -> Card {
        let mut card = card(id);
        card.state.review_count = reviews;
        card.state.stability = stability;
        let offset = (days * MILLIS_PER_DAY as f64) as i64;
        card.state.due_date = Timestamp::from_millis(NOW + offset).unwrap();
        card
    }

    fn q(value: u8) -> ReviewQuality {
        ReviewQuality::new(value).unwrap()
    }

    #[test]
    fn test_initial_state() {
        let state = create_initial_card_state(now());
        assert_eq!(state.difficulty, 0.3);
        assert_eq!(state.stability, 2.4);
        assert_eq!(state.ease_factor, 2.5);
        assert_eq!(state.review_count, 0);
        assert_eq!(state.last_review, now());
        assert_eq!(state.due_date, now());
    }

    #[test]
    fn test_first_review_good() {
        let result = update_card_state(&card("a"), q(4), now());
        let state = &result.card.state;
        assert_eq!(state.review_count, 1);
        assert!((state.stability - 2.88).abs() < 1e-9);
        assert!((state.difficulty - 0.2).abs() < 1e-9);
        // round(2.88 * 1.2) = 3 days.
        assert_eq!(result.next_review, now().plus_days(3));
        assert_eq!(state.due_date, result.next_review);
        assert_eq!(state.last_review, now());
    }

    #[test]
    fn test_first_review_forgotten() {
        let result = update_card_state(&card("a"), q(1), now());
        let state = &result.card.state;
        assert_eq!(state.stability, MIN_STABILITY);
        assert!((state.difficulty - 0.45).abs() < 1e-9);
        // round(0.4 * 1.45) = 1 day, which is also the floor.
        assert_eq!(result.next_review, now().plus_days(1));
    }

    #[test]
    fn test_difficulty_unchanged_for_middle_grades() {
        let base = reviewed_card("a", 2, 0.0, 5.0);
        for value in [2, 3] {
            let result = update_card_state(&base, q(value), now());
            assert_eq!(result.card.state.difficulty, base.state.difficulty);
        }
    }

    #[test]
    fn test_subsequent_review_success() {
        let base = reviewed_card("a", 2, 0.0, 10.0);
        let result = update_card_state(&base, q(5), now());
        // D = 0.3 - 0.2 = 0.1, S = 10 * 1.3 * 1.9 = 24.7
        assert!((result.card.state.difficulty - 0.1).abs() < 1e-9);
        assert!((result.card.state.stability - 24.7).abs() < 1e-9);
        // round(24.7 * 1.1) = round(27.17) = 27
        assert_eq!(result.next_review, now().plus_days(27));
    }

    #[test]
    fn test_subsequent_review_hard() {
        let base = reviewed_card("a", 2, 0.0, 10.0);
        let result = update_card_state(&base, q(2), now());
        assert!((result.card.state.stability - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_lapse_resets_stability() {
        for value in [0, 1] {
            let base = reviewed_card("a", 7, 0.0, 120.0);
            let result = update_card_state(&base, q(value), now());
            assert_eq!(result.card.state.stability, MIN_STABILITY);
        }
    }

    #[test]
    fn test_ease_factor_carried_through() {
        let mut base = reviewed_card("a", 1, 0.0, 3.0);
        base.state.ease_factor = 1.7;
        let result = update_card_state(&base, q(5), now());
        assert_eq!(result.card.state.ease_factor, 1.7);
    }

    #[test]
    fn test_input_card_not_mutated() {
        let base = card("a");
        let before = base.clone();
        let _ = update_card_state(&base, q(5), now());
        assert_eq!(base, before);
    }

    #[test]
    fn test_bounds_hold_over_many_reviews() {
        let mut c = card("a");
        let mut t = now();
        for i in 0..200u32 {
            let quality = q(((i * 7 + 3) % 6) as u8);
            let result = update_card_state(&c, quality, t);
            let state = &result.card.state;
            assert!(state.difficulty >= MIN_DIFFICULTY && state.difficulty <= MAX_DIFFICULTY);
            assert!(state.stability >= MIN_STABILITY);
            assert!(result.next_review >= t.plus_days(1));
            t = result.next_review;
            c = result.card;
        }
        assert_eq!(c.state.review_count, 200);
    }

    #[test]
    fn test_repeated_perfect_reviews() {
        let mut c = card("a");
        let mut t = now();
        for _ in 0..40 {
            let result = update_card_state(&c, ReviewQuality::PERFECT, t);
            assert!(result.next_review > c.state.due_date);
            assert!(result.next_review <= t.plus_days(MAX_INTERVAL as i64));
            t = result.next_review;
            c = result.card;
        }
        assert!(c.state.stability > 1e15);
    }

    #[test]
    fn test_interval_capped() {
        let base = reviewed_card("a", 4, 0.0, 1e12);
        let result = update_card_state(&base, q(5), now());
        assert_eq!(result.next_review, now().plus_days(36_500));
    }

    #[test]
    fn test_success_always_moves_due_date_forward() {
        for value in 3..=5 {
            for reviews in [0, 1, 5] {
                let base = reviewed_card("a", reviews, -4.0, 0.4);
                let result = update_card_state(&base, q(value), now());
                assert!(result.card.state.due_date > base.state.due_date);
            }
        }
    }

    #[test]
    fn test_is_card_due() {
        assert!(is_card_due(&reviewed_card("a", 1, 0.0, 1.0), now()));
        assert!(is_card_due(&reviewed_card("a", 1, -0.5, 1.0), now()));
        assert!(!is_card_due(&reviewed_card("a", 1, 0.1, 1.0), now()));
    }

    #[test]
    fn test_days_until_due() {
        assert_eq!(days_until_due(&reviewed_card("a", 1, 3.0, 1.0), now()), 3);
        assert_eq!(days_until_due(&reviewed_card("a", 1, -2.0, 1.0), now()), -2);
        assert_eq!(days_until_due(&reviewed_card("a", 1, 0.4, 1.0), now()), 0);
        assert_eq!(days_until_due(&reviewed_card("a", 1, -0.6, 1.0), now()), -1);
    }

    #[test]
    fn test_days_until_due_rounds_half_away_from_zero() {
        assert_eq!(days_until_due(&reviewed_card("a", 1, 2.5, 1.0), now()), 3);
        assert_eq!(days_until_due(&reviewed_card("a", 1, -1.5, 1.0), now()), -2);
        assert_eq!(days_until_due(&reviewed_card("a", 1, 0.5, 1.0), now()), 1);
    }

    #[test]
    fn test_priority_of_half_day_overdue() {
        let c = reviewed_card("a", 1, -1.5, 1.0);
        // Two days overdue after rounding, plus 10 / (1 + 1).
        assert_eq!(card_priority(&c, now()), 205.0);
        let future = reviewed_card("b", 1, 2.5, 1.0);
        assert_eq!(card_priority(&future, now()), -3.0);
    }

    #[test]
    fn test_priority_due_above_not_due() {
        let due = reviewed_card("a", 1, 0.0, 1000.0);
        let soon = reviewed_card("b", 1, 0.2, 1.0);
        assert!(card_priority(&due, now()) > card_priority(&soon, now()));
    }

    #[test]
    fn test_priority_prefers_fragile_cards() {
        let fragile = reviewed_card("a", 1, -1.0, 0.4);
        let sturdy = reviewed_card("b", 1, -1.0, 40.0);
        assert!(card_priority(&fragile, now()) > card_priority(&sturdy, now()));
    }

    #[test]
    fn test_sort_by_priority() {
        let cards = vec![
            reviewed_card("one-day-overdue", 1, -1.0, 5.0),
            reviewed_card("future", 1, 1.0, 5.0),
            reviewed_card("two-days-overdue", 1, -2.0, 5.0),
        ];
        let sorted = sort_cards_by_priority(&cards, now());
        let ids: Vec<&str> = sorted.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["two-days-overdue", "one-day-overdue", "future"]);
        // The input keeps its order.
        assert_eq!(cards[0].id.as_str(), "one-day-overdue");
    }

    #[test]
    fn test_sort_is_stable() {
        let cards = vec![card("x"), card("y"), card("z")];
        let sorted = sort_cards_by_priority(&cards, now());
        let ids: Vec<&str> = sorted.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["x", "y", "z"]);
    }

    #[test]
    fn test_sort_empty() {
        assert!(sort_cards_by_priority(&[], now()).is_empty());
    }

    #[test]
    fn test_due_cards() {
        let cards = vec![
            reviewed_card("a", 1, -1.0, 1.0),
            reviewed_card("b", 1, 1.0, 1.0),
            card("c"),
        ];
        let due = due_cards(&cards, now());
        let ids: Vec<&str> = due.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }
}
