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

use std::fmt::Display;
use std::fmt::Formatter;
use std::str::FromStr;

use serde::Serialize;

use crate::error::ErrorReport;
use crate::types::card::Card;

/// Reviews a card needs before it leaves the learning phase.
const LEARNING_REVIEWS: u32 = 3;

/// Stability, in days, at which a card counts as mastered.
const MASTERED_STABILITY: f64 = 30.0;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CardStatus {
    New,
    Learning,
    Review,
    Mastered,
}

impl CardStatus {
    pub fn label(self) -> &'static str {
        match self {
            CardStatus::New => "New",
            CardStatus::Learning => "Learning",
            CardStatus::Review => "Review",
            CardStatus::Mastered => "Mastered",
        }
    }
}

impl FromStr for CardStatus {
    type Err = ErrorReport;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "new" => Ok(CardStatus::New),
            "learning" => Ok(CardStatus::Learning),
            "review" => Ok(CardStatus::Review),
            "mastered" => Ok(CardStatus::Mastered),
            _ => Err(ErrorReport::new(format!("unknown card status: {s}"))),
        }
    }
}

impl Display for CardStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

pub fn card_status(card: &Card) -> CardStatus {
    let state = &card.state;
    if state.review_count == 0 {
        CardStatus::New
    } else if state.review_count < LEARNING_REVIEWS {
        CardStatus::Learning
    } else if state.stability >= MASTERED_STABILITY {
        CardStatus::Mastered
    } else {
        CardStatus::Review
    }
}

/// `None` keeps every card.
pub fn filter_cards_by_status(cards: &[Card], status: Option<CardStatus>) -> Vec<Card> {
    match status {
        None => cards.to_vec(),
        Some(status) => cards
            .iter()
            .filter(|card| card_status(card) == status)
            .cloned()
            .collect(),
    }
}

/// `None` keeps every card.
pub fn filter_cards_by_tag(cards: &[Card], tag: Option<&str>) -> Vec<Card> {
    match tag {
        None => cards.to_vec(),
        Some(tag) => cards
            .iter()
            .filter(|card| card.tags.contains(tag))
            .cloned()
            .collect(),
    }
}

/// Case-insensitive substring search over both sides of each card.
pub fn search_cards(cards: &[Card], text: &str) -> Vec<Card> {
    let needle = text.trim().to_lowercase();
    if needle.is_empty() {
        return cards.to_vec();
    }
    cards
        .iter()
        .filter(|card| {
            card.front.to_lowercase().contains(&needle)
                || card.back.to_lowercase().contains(&needle)
        })
        .cloned()
        .collect()
}
