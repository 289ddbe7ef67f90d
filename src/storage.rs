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

//! The persistence boundary. The scheduling engine never touches storage
//! directly; callers load cards and configuration through a [`Storage`],
//! run the pure engine, and hand the results back.

use std::collections::BTreeMap;

use crate::error::Fallible;
use crate::queue::ReviewQueueConfig;
use crate::quiz::QuizResult;
use crate::types::card::Card;

pub trait Storage {
    /// Load the cards of a deck. Records that fail validation are dropped.
    /// An unknown deck has no cards.
    fn load_cards(&self, deck: &str) -> Fallible<Vec<Card>>;

    /// Replace the cards of a deck.
    fn save_cards(&mut self, deck: &str, cards: &[Card]) -> Fallible<()>;

    /// Names of the decks that have at least one card, sorted.
    fn list_decks(&self) -> Fallible<Vec<String>>;

    fn clear_deck(&mut self, deck: &str) -> Fallible<()>;

    /// The stored queue configuration, as written. Day rollover is applied
    /// by [`crate::queue::load_queue_config`], not here.
    fn load_queue_config(&self) -> Fallible<Option<ReviewQueueConfig>>;

    fn save_queue_config(&mut self, config: &ReviewQueueConfig) -> Fallible<()>;

    fn load_quiz_result(&self, deck: &str, topic: &str) -> Fallible<Option<QuizResult>>;

    fn save_quiz_result(&mut self, deck: &str, topic: &str, result: &QuizResult) -> Fallible<()>;
}

/// Keeps everything in memory. Useful for tests and for embedding the
/// engine somewhere that manages its own persistence.
#[derive(Default)]
pub struct MemoryStorage {
    decks: BTreeMap<String, Vec<Card>>,
    queue_config: Option<ReviewQueueConfig>,
    quiz_results: BTreeMap<(String, String), QuizResult>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn load_cards(&self, deck: &str) -> Fallible<Vec<Card>> {
        Ok(self.decks.get(deck).cloned().unwrap_or_default())
    }

    fn save_cards(&mut self, deck: &str, cards: &[Card]) -> Fallible<()> {
        self.decks.insert(deck.to_string(), cards.to_vec());
        Ok(())
    }

    fn list_decks(&self) -> Fallible<Vec<String>> {
        Ok(self
            .decks
            .iter()
            .filter(|(_, cards)| !cards.is_empty())
            .map(|(name, _)| name.clone())
            .collect())
    }

    fn clear_deck(&mut self, deck: &str) -> Fallible<()> {
        self.decks.remove(deck);
        Ok(())
    }

    fn load_queue_config(&self) -> Fallible<Option<ReviewQueueConfig>> {
        Ok(self.queue_config.clone())
    }

    fn save_queue_config(&mut self, config: &ReviewQueueConfig) -> Fallible<()> {
        self.queue_config = Some(config.clone());
        Ok(())
    }

    fn load_quiz_result(&self, deck: &str, topic: &str) -> Fallible<Option<QuizResult>> {
        let key = (deck.to_string(), topic.to_string());
        Ok(self.quiz_results.get(&key).cloned())
    }

    fn save_quiz_result(&mut self, deck: &str, topic: &str, result: &QuizResult) -> Fallible<()> {
        let key = (deck.to_string(), topic.to_string());
        self.quiz_results.insert(key, result.clone());
        Ok(())
    }
}
