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

use serde::Deserialize;
use serde::Serialize;

use crate::error::Fallible;
use crate::error::fail;
use crate::scheduler::days_until_due;
use crate::scheduler::due_cards;
use crate::scheduler::sort_cards_by_priority;
use crate::storage::Storage;
use crate::types::card::Card;
use crate::types::date::Date;
use crate::types::timestamp::Timestamp;

pub const DEFAULT_MAX_NEW_CARDS_PER_DAY: u32 = 20;

/// The daily budget for introducing new cards.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewQueueConfig {
    pub max_new_cards_per_day: u32,
    pub new_cards_studied_today: u32,
    pub last_study_date: Date,
}

impl ReviewQueueConfig {
    pub fn new(max_new_cards_per_day: u32, today: Date) -> Self {
        Self {
            max_new_cards_per_day,
            new_cards_studied_today: 0,
            last_study_date: today,
        }
    }

    /// How many more new cards may be introduced today.
    pub fn remaining_new_card_slots(&self) -> u32 {
        self.max_new_cards_per_day
            .saturating_sub(self.new_cards_studied_today)
    }

    /// The same configuration with the daily count reset if `today` is a
    /// different day from the last study date.
    fn rolled_over(self, today: Date, default_max: u32) -> Self {
        if self.last_study_date == today {
            return self;
        }
        let max = if self.max_new_cards_per_day == 0 {
            default_max
        } else {
            self.max_new_cards_per_day
        };
        Self::new(max, today)
    }
}

/// The cards to present in one session.
#[derive(Clone, Debug, Default)]
pub struct ReviewQueue {
    /// Due new cards, by priority, capped at the remaining daily budget.
    pub new_cards: Vec<Card>,
    /// Every due review card, by priority, uncapped.
    pub review_cards: Vec<Card>,
    /// Presentation order: overdue reviews, then new cards, then reviews
    /// due today.
    pub all_cards: Vec<Card>,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub total_due: usize,
    pub new_cards_available: usize,
    pub new_cards_in_queue: usize,
    pub review_cards_in_queue: usize,
    pub remaining_new_card_slots: usize,
}

pub fn load_queue_config(storage: &dyn Storage, now: Timestamp) -> Fallible<ReviewQueueConfig> {
    load_queue_config_or(storage, DEFAULT_MAX_NEW_CARDS_PER_DAY, now)
}

/// Load the queue configuration, using `default_max` as the daily limit
/// when nothing usable is stored. The daily count is reset lazily here when
/// the calendar day has changed since the last study date.
pub fn load_queue_config_or(
    storage: &dyn Storage,
    default_max: u32,
    now: Timestamp,
) -> Fallible<ReviewQueueConfig> {
    let today = now.local_date();
    let config = match storage.load_queue_config()? {
        Some(config) => {
            if config.last_study_date != today {
                log::debug!(
                    "New study day ({} -> {today}), resetting new card count.",
                    config.last_study_date
                );
            }
            config.rolled_over(today, default_max)
        }
        None => ReviewQueueConfig::new(default_max, today),
    };
    Ok(config)
}

pub fn save_queue_config(storage: &mut dyn Storage, config: &ReviewQueueConfig) -> Fallible<()> {
    storage.save_queue_config(config)
}

/// Record that one more new card was studied today.
pub fn increment_new_cards_studied(
    storage: &mut dyn Storage,
    now: Timestamp,
) -> Fallible<ReviewQueueConfig> {
    let mut config = load_queue_config(storage, now)?;
    let today = now.local_date();
    if config.last_study_date != today {
        config.new_cards_studied_today = 0;
        config.last_study_date = today;
    }
    config.new_cards_studied_today += 1;
    storage.save_queue_config(&config)?;
    Ok(config)
}

pub fn update_max_new_cards_per_day(
    storage: &mut dyn Storage,
    max_new_cards: u32,
    now: Timestamp,
) -> Fallible<ReviewQueueConfig> {
    if max_new_cards == 0 {
        return fail("the daily new card limit must be at least 1.");
    }
    let mut config = load_queue_config(storage, now)?;
    config.max_new_cards_per_day = max_new_cards;
    storage.save_queue_config(&config)?;
    Ok(config)
}

pub fn build_review_queue(
    cards: &[Card],
    config: &ReviewQueueConfig,
    now: Timestamp,
) -> ReviewQueue {
    let (new_cards, review_cards): (Vec<Card>, Vec<Card>) = due_cards(cards, now)
        .into_iter()
        .partition(|card| card.is_new());

    let new_cards = sort_cards_by_priority(&new_cards, now);
    let review_cards = sort_cards_by_priority(&review_cards, now);

    let slots = config.remaining_new_card_slots() as usize;
    let new_cards: Vec<Card> = new_cards.into_iter().take(slots).collect();

    let (overdue, due_today): (Vec<&Card>, Vec<&Card>) = review_cards
        .iter()
        .partition(|card| days_until_due(card, now) < 0);

    let mut all_cards: Vec<Card> =
        Vec::with_capacity(overdue.len() + new_cards.len() + due_today.len());
    all_cards.extend(overdue.iter().map(|card| (*card).clone()));
    all_cards.extend(new_cards.iter().cloned());
    all_cards.extend(due_today.iter().map(|card| (*card).clone()));

    log::debug!(
        "Built review queue: {} overdue, {} new ({} slots), {} due today.",
        overdue.len(),
        new_cards.len(),
        slots,
        due_today.len()
    );

    ReviewQueue {
        new_cards,
        review_cards,
        all_cards,
    }
}

/// Summary numbers for display. `new_cards_available` adds the queued new
/// cards to the remaining budget, so queued cards are counted twice.
pub fn queue_stats(queue: &ReviewQueue, config: &ReviewQueueConfig) -> QueueStats {
    let remaining = config.remaining_new_card_slots() as usize;
    QueueStats {
        total_due: queue.all_cards.len(),
        new_cards_available: queue.new_cards.len() + remaining,
        new_cards_in_queue: queue.new_cards.len(),
        review_cards_in_queue: queue.review_cards.len(),
        remaining_new_card_slots: remaining,
    }
}
