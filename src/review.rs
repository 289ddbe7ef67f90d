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

use crate::scheduler::create_initial_card_state;
use crate::scheduler::update_card_state;
use crate::types::card::Card;
use crate::types::quality::ReviewQuality;
use crate::types::timestamp::MILLIS_PER_DAY;
use crate::types::timestamp::Timestamp;

/// What a presenting surface needs to know after a card has been graded.
#[derive(Clone, Debug)]
pub struct ReviewOutcome {
    pub updated_card: Card,
    /// Whether the card had never been reviewed before this review. Callers
    /// use this to charge the daily new card budget.
    pub was_new_card: bool,
    pub is_correct: bool,
    pub next_review: Timestamp,
}

pub fn process_card_review(
    card: &Card,
    quality: ReviewQuality,
    reviewed_at: Timestamp,
) -> ReviewOutcome {
    let was_new_card = card.is_new();
    let result = update_card_state(card, quality, reviewed_at);
    let state = &result.card.state;
    log::debug!(
        "{} q={} S={:.2}d D={:.2} due={}",
        card.id,
        quality,
        state.stability,
        state.difficulty,
        state.due_date.local_date()
    );
    ReviewOutcome {
        was_new_card,
        is_correct: quality.is_correct(),
        next_review: result.next_review,
        updated_card: result.card,
    }
}

/// Forget all scheduling progress on a card.
pub fn reset_card_state(card: &Card, now: Timestamp) -> Card {
    card.with_state(create_initial_card_state(now))
}

/// Whole days elapsed since `ts`, rounded down.
pub fn days_since(ts: Timestamp, now: Timestamp) -> i64 {
    ts.millis_until(now).div_euclid(MILLIS_PER_DAY)
}

pub fn days_since_card_created(card: &Card, now: Timestamp) -> i64 {
    days_since(card.created_at, now)
}

/// `None` for a card that has never been reviewed.
pub fn days_since_last_review(card: &Card, now: Timestamp) -> Option<i64> {
    if card.is_new() {
        return None;
    }
    Some(days_since(card.state.last_review, now))
}
