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

use serde::Serialize;

use crate::scheduler::MIN_STABILITY;
use crate::scheduler::due_cards;
use crate::status::CardStatus;
use crate::status::card_status;
use crate::types::card::Card;
use crate::types::timestamp::Timestamp;

/// Aggregate numbers over a set of cards. Filter by deck before calling.
#[derive(Clone, PartialEq, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionStatistics {
    pub total_cards: usize,
    pub due_count: usize,
    pub new_count: usize,
    pub learning_count: usize,
    pub review_count: usize,
    pub mastered_count: usize,
    pub average_stability: f64,
    pub average_difficulty: f64,
    pub total_reviews: u64,
    /// Percentage of cards whose stability is above the lapse floor.
    pub retention_rate: f64,
}

pub fn calculate_statistics(cards: &[Card], now: Timestamp) -> CollectionStatistics {
    if cards.is_empty() {
        return CollectionStatistics::default();
    }
    let mut stats = CollectionStatistics {
        total_cards: cards.len(),
        due_count: due_cards(cards, now).len(),
        ..Default::default()
    };
    let mut total_stability = 0.0;
    let mut total_difficulty = 0.0;
    let mut retained = 0usize;
    for card in cards {
        match card_status(card) {
            CardStatus::New => stats.new_count += 1,
            CardStatus::Learning => stats.learning_count += 1,
            CardStatus::Review => stats.review_count += 1,
            CardStatus::Mastered => stats.mastered_count += 1,
        }
        total_stability += card.state.stability;
        total_difficulty += card.state.difficulty;
        stats.total_reviews += card.state.review_count as u64;
        if card.state.stability > MIN_STABILITY {
            retained += 1;
        }
    }
    let n = cards.len() as f64;
    stats.average_stability = total_stability / n;
    stats.average_difficulty = total_difficulty / n;
    stats.retention_rate = retained as f64 / n * 100.0;
    stats
}
