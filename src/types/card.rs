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

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

use crate::scheduler::create_initial_card_state;
use crate::types::card_id::CardId;
use crate::types::timestamp::Timestamp;

/// The scheduling state of a card. Replaced wholesale on every review.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardState {
    /// How hard the card is to retain, in `[0.1, 0.9]`.
    pub difficulty: f64,
    /// Days the memory is expected to hold. Never below 0.4.
    pub stability: f64,
    /// When the card was last reviewed, or created if never reviewed.
    pub last_review: Timestamp,
    /// When the card next becomes eligible for review.
    pub due_date: Timestamp,
    /// Number of completed reviews. Zero means the card is new.
    pub review_count: u32,
    /// Carried through every update but not read by the scheduler.
    pub ease_factor: f64,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: CardId,
    pub front: String,
    pub back: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub created_at: Timestamp,
    pub state: CardState,
}

impl Card {
    /// Create a fresh card whose id is derived from its content.
    pub fn new(
        front: impl Into<String>,
        back: impl Into<String>,
        tags: BTreeSet<String>,
        now: Timestamp,
    ) -> Self {
        let front = front.into().trim().to_string();
        let back = back.into().trim().to_string();
        Self {
            id: CardId::from_content(&front, &back),
            front,
            back,
            tags,
            created_at: now,
            state: create_initial_card_state(now),
        }
    }

    /// A copy of this card with its scheduling state replaced.
    pub fn with_state(&self, state: CardState) -> Self {
        Self {
            state,
            ..self.clone()
        }
    }

    pub fn is_new(&self) -> bool {
        self.state.review_count == 0
    }
}
