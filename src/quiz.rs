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

//! Single-chance quiz mode: which cards were answered, and whether each
//! answer was right.

use std::collections::HashSet;

use serde::Deserialize;
use serde::Serialize;

use crate::error::Fallible;
use crate::storage::Storage;
use crate::types::card::Card;
use crate::types::card_id::CardId;

/// Invariant: `correct` and `incorrect` are disjoint, and both are subsets
/// of `answered`.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct QuizTrackingState {
    answered: HashSet<CardId>,
    correct: HashSet<CardId>,
    incorrect: HashSet<CardId>,
}

impl QuizTrackingState {
    pub fn answered(&self) -> &HashSet<CardId> {
        &self.answered
    }

    pub fn correct(&self) -> &HashSet<CardId> {
        &self.correct
    }

    pub fn incorrect(&self) -> &HashSet<CardId> {
        &self.incorrect
    }
}

pub fn create_quiz_tracking_state() -> QuizTrackingState {
    QuizTrackingState::default()
}

pub fn reset_quiz_tracking_state() -> QuizTrackingState {
    create_quiz_tracking_state()
}

/// Record an answer. Answering a card again moves it to the other set
/// rather than putting it in both.
pub fn track_quiz_answer(
    state: &QuizTrackingState,
    card_id: &CardId,
    is_correct: bool,
) -> QuizTrackingState {
    let mut next = state.clone();
    next.answered.insert(card_id.clone());
    if is_correct {
        next.incorrect.remove(card_id);
        next.correct.insert(card_id.clone());
    } else {
        next.correct.remove(card_id);
        next.incorrect.insert(card_id.clone());
    }
    next
}

pub fn is_quiz_complete(state: &QuizTrackingState, total_cards: usize) -> bool {
    total_cards > 0 && state.answered.len() >= total_cards
}

/// In quiz mode the index stops at the last card. In study mode it wraps
/// around to the first card.
pub fn next_card_index(current_index: usize, total_cards: usize, quiz_mode: bool) -> usize {
    if current_index + 1 < total_cards {
        current_index + 1
    } else if quiz_mode {
        current_index
    } else {
        0
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizResult {
    pub total_cards: usize,
    pub correct_cards: usize,
    pub incorrect_cards: usize,
    /// Percentage of correct answers, rounded.
    pub score: u32,
    pub correct_card_ids: Vec<CardId>,
    pub incorrect_card_ids: Vec<CardId>,
}

pub fn calculate_quiz_score(correct: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (correct as f64 / total as f64 * 100.0).round() as u32
}

pub fn create_quiz_result(
    total_cards: usize,
    correct_card_ids: Vec<CardId>,
    incorrect_card_ids: Vec<CardId>,
) -> QuizResult {
    QuizResult {
        total_cards,
        correct_cards: correct_card_ids.len(),
        incorrect_cards: incorrect_card_ids.len(),
        score: calculate_quiz_score(correct_card_ids.len(), total_cards),
        correct_card_ids,
        incorrect_card_ids,
    }
}

/// Build the result of a finished quiz. Ids are sorted so the result is
/// deterministic.
pub fn quiz_result_from_state(state: &QuizTrackingState, total_cards: usize) -> QuizResult {
    let mut correct: Vec<CardId> = state.correct.iter().cloned().collect();
    let mut incorrect: Vec<CardId> = state.incorrect.iter().cloned().collect();
    correct.sort();
    incorrect.sort();
    create_quiz_result(total_cards, correct, incorrect)
}

/// Narrow a quiz to the cards missed last time, when asked to and when
/// there is a previous list to narrow to.
pub fn filter_cards_for_quiz(
    cards: &[Card],
    incorrect_only: bool,
    previous_incorrect: &[CardId],
) -> Vec<Card> {
    if !incorrect_only || previous_incorrect.is_empty() {
        return cards.to_vec();
    }
    let keep: HashSet<&CardId> = previous_incorrect.iter().collect();
    cards
        .iter()
        .filter(|card| keep.contains(&card.id))
        .cloned()
        .collect()
}

pub fn save_quiz_result(
    storage: &mut dyn Storage,
    deck: &str,
    topic: &str,
    result: &QuizResult,
) -> Fallible<()> {
    let mut result = result.clone();
    if result.incorrect_cards == 0 {
        result.incorrect_card_ids.clear();
    }
    log::debug!(
        "Saving quiz result for {deck}/{topic}: {}/{} ({}%).",
        result.correct_cards,
        result.total_cards,
        result.score
    );
    storage.save_quiz_result(deck, topic, &result)
}

pub fn load_quiz_result(
    storage: &dyn Storage,
    deck: &str,
    topic: &str,
) -> Fallible<Option<QuizResult>> {
    storage.load_quiz_result(deck, topic)
}

pub fn incorrect_card_ids_from_quiz(
    storage: &dyn Storage,
    deck: &str,
    topic: &str,
) -> Fallible<Vec<CardId>> {
    Ok(load_quiz_result(storage, deck, topic)?
        .map(|result| result.incorrect_card_ids)
        .unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::tests::card;
    use crate::storage::MemoryStorage;

    fn id(s: &str) -> CardId {
        CardId::new(s)
    }

    #[test]
    fn test_create_is_empty() {
        let state = create_quiz_tracking_state();
        assert!(state.answered().is_empty());
        assert!(state.correct().is_empty());
        assert!(state.incorrect().is_empty());
        assert_eq!(reset_quiz_tracking_state(), state);
    }

    #[test]
    fn test_track_answers() {
        let state = create_quiz_tracking_state();
        let state = track_quiz_answer(&state, &id("a"), true);
        let state = track_quiz_answer(&state, &id("b"), false);
        assert_eq!(state.answered().len(), 2);
        assert!(state.correct().contains(&id("a")));
        assert!(state.incorrect().contains(&id("b")));
    }

    #[test]
    fn test_track_does_not_mutate_input() {
        let state = create_quiz_tracking_state();
        let _ = track_quiz_answer(&state, &id("a"), true);
        assert!(state.answered().is_empty());
    }

    #[test]
    fn test_reanswer_flips_classification() {
        let state = create_quiz_tracking_state();
        let state = track_quiz_answer(&state, &id("a"), false);
        let state = track_quiz_answer(&state, &id("a"), true);
        assert_eq!(state.answered().len(), 1);
        assert!(state.correct().contains(&id("a")));
        assert!(!state.incorrect().contains(&id("a")));
        let state = track_quiz_answer(&state, &id("a"), false);
        assert!(!state.correct().contains(&id("a")));
        assert!(state.incorrect().contains(&id("a")));
    }

    #[test]
    fn test_completion() {
        let mut state = create_quiz_tracking_state();
        assert!(!is_quiz_complete(&state, 0));
        for (i, name) in ["a", "b", "c"].iter().enumerate() {
            assert!(!is_quiz_complete(&state, 3), "complete after {i} answers");
            state = track_quiz_answer(&state, &id(name), i % 2 == 0);
        }
        assert!(is_quiz_complete(&state, 3));
        state = track_quiz_answer(&state, &id("d"), true);
        assert!(is_quiz_complete(&state, 3));
    }

    #[test]
    fn test_next_card_index() {
        assert_eq!(next_card_index(0, 3, true), 1);
        assert_eq!(next_card_index(2, 3, true), 2);
        assert_eq!(next_card_index(0, 3, false), 1);
        assert_eq!(next_card_index(2, 3, false), 0);
        assert_eq!(next_card_index(0, 1, true), 0);
        assert_eq!(next_card_index(0, 0, false), 0);
    }

    #[test]
    fn test_quiz_score() {
        assert_eq!(calculate_quiz_score(0, 0), 0);
        assert_eq!(calculate_quiz_score(1, 3), 33);
        assert_eq!(calculate_quiz_score(2, 3), 67);
        assert_eq!(calculate_quiz_score(1, 8), 13);
        assert_eq!(calculate_quiz_score(4, 4), 100);
    }

    #[test]
    fn test_result_from_state() {
        let state = create_quiz_tracking_state();
        let state = track_quiz_answer(&state, &id("b"), true);
        let state = track_quiz_answer(&state, &id("a"), true);
        let state = track_quiz_answer(&state, &id("c"), false);
        let result = quiz_result_from_state(&state, 4);
        assert_eq!(result.correct_card_ids, vec![id("a"), id("b")]);
        assert_eq!(result.incorrect_card_ids, vec![id("c")]);
        assert_eq!(result.correct_cards, 2);
        assert_eq!(result.incorrect_cards, 1);
        assert_eq!(result.score, 50);
    }

    #[test]
    fn test_filter_cards_for_quiz() {
        let cards = vec![card("a"), card("b"), card("c")];
        assert_eq!(filter_cards_for_quiz(&cards, false, &[id("b")]).len(), 3);
        assert_eq!(filter_cards_for_quiz(&cards, true, &[]).len(), 3);
        let filtered = filter_cards_for_quiz(&cards, true, &[id("c"), id("a")]);
        let ids: Vec<&str> = filtered.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn test_save_and_load_result() -> Fallible<()> {
        let mut storage = MemoryStorage::new();
        assert!(incorrect_card_ids_from_quiz(&storage, "deck", "topic")?.is_empty());
        let result = create_quiz_result(3, vec![id("a")], vec![id("b"), id("c")]);
        save_quiz_result(&mut storage, "deck", "topic", &result)?;
        assert_eq!(
            incorrect_card_ids_from_quiz(&storage, "deck", "topic")?,
            vec![id("b"), id("c")]
        );
        assert!(load_quiz_result(&storage, "deck", "other")?.is_none());
        Ok(())
    }

    #[test]
    fn test_save_clears_incorrect_ids_on_perfect_score() -> Fallible<()> {
        let mut storage = MemoryStorage::new();
        let mut result = create_quiz_result(2, vec![id("a"), id("b")], vec![]);
        result.incorrect_card_ids = vec![id("stale")];
        save_quiz_result(&mut storage, "deck", "topic", &result)?;
        assert!(incorrect_card_ids_from_quiz(&storage, "deck", "topic")?.is_empty());
        Ok(())
    }
}
