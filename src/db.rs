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

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::Row;
use rusqlite::Transaction;
use rusqlite::types::Value;

use crate::error::Fallible;
use crate::queue::ReviewQueueConfig;
use crate::quiz::QuizResult;
use crate::scheduler::INITIAL_EASE_FACTOR;
use crate::storage::Storage;
use crate::types::card::Card;
use crate::types::card::CardState;
use crate::types::card_id::CardId;
use crate::types::timestamp::Timestamp;

/// The queue configuration is shared by every deck.
const QUEUE_CONFIG_KEY: &str = "review-queue-config";

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn new(database_path: &str) -> Fallible<Self> {
        let mut conn = Connection::open(database_path)?;
        {
            let tx = conn.transaction()?;
            if !probe_schema_exists(&tx)? {
                log::debug!("Creating schema in {database_path}.");
                tx.execute_batch(include_str!("schema.sql"))?;
                tx.commit()?;
            }
        }
        Ok(Self { conn })
    }

    fn get_setting<T: serde::de::DeserializeOwned>(&self, key: &str) -> Fallible<Option<T>> {
        let sql = "select value from settings where key = ?;";
        let value: Option<String> = self
            .conn
            .query_row(sql, [key], |row| row.get(0))
            .optional()?;
        let Some(value) = value else {
            return Ok(None);
        };
        match serde_json::from_str(&value) {
            Ok(parsed) => Ok(Some(parsed)),
            Err(e) => {
                log::warn!("Ignoring malformed setting {key}: {e}");
                Ok(None)
            }
        }
    }

    fn put_setting<T: serde::Serialize>(&mut self, key: &str, value: &T) -> Fallible<()> {
        let json = serde_json::to_string(value)?;
        let sql = "insert into settings (key, value) values (?, ?) on conflict (key) do update set value = excluded.value;";
        self.conn.execute(sql, (key, json))?;
        Ok(())
    }
}

impl Storage for Database {
    fn load_cards(&self, deck: &str) -> Fallible<Vec<Card>> {
        let sql = "select card_id, front, back, tags, created_at, difficulty, stability, last_review, due_date, review_count, ease_factor from cards where deck_name = ? order by position;";
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query([deck])?;
        let mut cards = Vec::new();
        let mut dropped = 0;
        while let Some(row) = rows.next()? {
            match parse_card_row(row)? {
                Some(card) => cards.push(card),
                None => dropped += 1,
            }
        }
        if dropped > 0 {
            log::warn!("Dropped {dropped} malformed card(s) from deck {deck}.");
        }
        log::debug!("Loaded {} cards from deck {deck}.", cards.len());
        Ok(cards)
    }

    fn save_cards(&mut self, deck: &str, cards: &[Card]) -> Fallible<()> {
        let tx = self.conn.transaction()?;
        tx.execute("delete from cards where deck_name = ?;", [deck])?;
        for (position, card) in cards.iter().enumerate() {
            insert_card(&tx, deck, position, card)?;
        }
        tx.commit()?;
        log::debug!("Saved {} cards to deck {deck}.", cards.len());
        Ok(())
    }

    fn list_decks(&self) -> Fallible<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("select distinct deck_name from cards order by deck_name;")?;
        let mut rows = stmt.query([])?;
        let mut decks = Vec::new();
        while let Some(row) = rows.next()? {
            decks.push(row.get(0)?);
        }
        Ok(decks)
    }

    fn clear_deck(&mut self, deck: &str) -> Fallible<()> {
        self.conn
            .execute("delete from cards where deck_name = ?;", [deck])?;
        Ok(())
    }

    fn load_queue_config(&self) -> Fallible<Option<ReviewQueueConfig>> {
        self.get_setting(QUEUE_CONFIG_KEY)
    }

    fn save_queue_config(&mut self, config: &ReviewQueueConfig) -> Fallible<()> {
        self.put_setting(QUEUE_CONFIG_KEY, config)
    }

    fn load_quiz_result(&self, deck: &str, topic: &str) -> Fallible<Option<QuizResult>> {
        let sql = "select result from quiz_results where deck_name = ? and topic = ?;";
        let json: Option<String> = self
            .conn
            .query_row(sql, (deck, topic), |row| row.get(0))
            .optional()?;
        let Some(json) = json else {
            return Ok(None);
        };
        match serde_json::from_str(&json) {
            Ok(result) => Ok(Some(result)),
            Err(e) => {
                log::warn!("Ignoring malformed quiz result for {deck}/{topic}: {e}");
                Ok(None)
            }
        }
    }

    fn save_quiz_result(&mut self, deck: &str, topic: &str, result: &QuizResult) -> Fallible<()> {
        let json = serde_json::to_string(result)?;
        let sql = "insert into quiz_results (deck_name, topic, result) values (?, ?, ?) on conflict (deck_name, topic) do update set result = excluded.result;";
        self.conn.execute(sql, (deck, topic, json))?;
        Ok(())
    }
}

fn insert_card(tx: &Transaction, deck: &str, position: usize, card: &Card) -> Fallible<()> {
    let sql = "insert into cards (deck_name, card_id, position, front, back, tags, created_at, difficulty, stability, last_review, due_date, review_count, ease_factor) values (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?);";
    let tags = serde_json::to_string(&card.tags)?;
    let state = &card.state;
    tx.execute(
        sql,
        (
            deck,
            &card.id,
            position as i64,
            &card.front,
            &card.back,
            tags,
            card.created_at,
            state.difficulty,
            state.stability,
            state.last_review,
            state.due_date,
            state.review_count,
            state.ease_factor,
        ),
    )?;
    Ok(())
}

/// Returns `None` if the row does not describe a usable card.
fn parse_card_row(row: &Row) -> Fallible<Option<Card>> {
    let id: Value = row.get(0)?;
    let front: Value = row.get(1)?;
    let back: Value = row.get(2)?;
    let tags: Value = row.get(3)?;
    let created_at: Value = row.get(4)?;
    let difficulty: Value = row.get(5)?;
    let stability: Value = row.get(6)?;
    let last_review: Value = row.get(7)?;
    let due_date: Value = row.get(8)?;
    let review_count: Value = row.get(9)?;
    let ease_factor: Value = row.get(10)?;

    let (Value::Text(id), Value::Text(front), Value::Text(back)) = (id, front, back) else {
        return Ok(None);
    };
    if id.is_empty() {
        return Ok(None);
    }
    let (Some(difficulty), Some(stability), Some(last_review), Some(due_date)) = (
        number(&difficulty),
        number(&stability),
        timestamp(&last_review),
        timestamp(&due_date),
    ) else {
        log::warn!("Card {id} has an invalid scheduling state.");
        return Ok(None);
    };
    let review_count = match review_count {
        Value::Null => Some(0),
        Value::Integer(n) => u32::try_from(n).ok(),
        _ => None,
    };
    let Some(review_count) = review_count else {
        log::warn!("Card {id} has an invalid review count.");
        return Ok(None);
    };
    let ease_factor = number(&ease_factor).unwrap_or(INITIAL_EASE_FACTOR);
    let created_at = timestamp(&created_at).unwrap_or(last_review);
    let tags: BTreeSet<String> = match tags {
        Value::Text(json) => serde_json::from_str(&json).unwrap_or_default(),
        _ => BTreeSet::new(),
    };

    Ok(Some(Card {
        id: CardId::new(id),
        front,
        back,
        tags,
        created_at,
        state: CardState {
            difficulty,
            stability,
            last_review,
            due_date,
            review_count,
            ease_factor,
        },
    }))
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Real(f) if f.is_finite() => Some(*f),
        Value::Integer(n) => Some(*n as f64),
        _ => None,
    }
}

fn timestamp(value: &Value) -> Option<Timestamp> {
    match value {
        Value::Integer(n) => Timestamp::from_millis(*n),
        _ => None,
    }
}

fn probe_schema_exists(tx: &Transaction) -> Fallible<bool> {
    let sql = "select count(*) from sqlite_master where type='table' AND name=?;";
    let count: i64 = tx.query_row(sql, ["cards"], |row| row.get(0))?;
    Ok(count > 0)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;
    use tempfile::tempdir;

    use super::*;
    use crate::quiz::create_quiz_result;
    use crate::scheduler::tests::card;
    use crate::scheduler::tests::now;
    use crate::scheduler::tests::reviewed_card;

    fn open() -> Fallible<(TempDir, Database)> {
        let dir = tempdir()?;
        let path = dir.path().join("cards.db");
        let db = Database::new(path.to_str().unwrap())?;
        Ok((dir, db))
    }

    #[test]
    fn test_reopen_existing_database() -> Fallible<()> {
        let dir = tempdir()?;
        let path = dir.path().join("cards.db");
        let path = path.to_str().unwrap();
        {
            let mut db = Database::new(path)?;
            db.save_cards("deck", &[card("a")])?;
        }
        let db = Database::new(path)?;
        assert_eq!(db.load_cards("deck")?.len(), 1);
        Ok(())
    }

    #[test]
    fn test_cards_roundtrip_in_order() -> Fallible<()> {
        let (_dir, mut db) = open()?;
        let mut tagged = reviewed_card("b", 3, -2.0, 17.5);
        tagged.tags.insert("rust".to_string());
        tagged.state.ease_factor = 1.9;
        let cards = vec![card("z"), tagged, card("a")];
        db.save_cards("deck", &cards)?;
        assert_eq!(db.load_cards("deck")?, cards);
        assert!(db.load_cards("other")?.is_empty());
        Ok(())
    }

    #[test]
    fn test_save_replaces_deck() -> Fallible<()> {
        let (_dir, mut db) = open()?;
        db.save_cards("deck", &[card("a"), card("b")])?;
        db.save_cards("deck", &[card("c")])?;
        let ids: Vec<String> = db
            .load_cards("deck")?
            .into_iter()
            .map(|c| c.id.to_string())
            .collect();
        assert_eq!(ids, vec!["c"]);
        Ok(())
    }

    #[test]
    fn test_malformed_rows_are_dropped() -> Fallible<()> {
        let (_dir, mut db) = open()?;
        db.save_cards("deck", &[card("good"), card("bad")])?;
        db.conn.execute(
            "update cards set stability = 'lots' where card_id = 'bad';",
            [],
        )?;
        let cards = db.load_cards("deck")?;
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].id.as_str(), "good");
        Ok(())
    }

    #[test]
    fn test_null_due_date_is_dropped() -> Fallible<()> {
        let (_dir, mut db) = open()?;
        db.save_cards("deck", &[card("a")])?;
        db.conn
            .execute("update cards set due_date = null;", [])?;
        assert!(db.load_cards("deck")?.is_empty());
        Ok(())
    }

    #[test]
    fn test_out_of_range_review_count_is_dropped() -> Fallible<()> {
        let (_dir, mut db) = open()?;
        db.save_cards("deck", &[card("ok"), card("huge"), card("negative")])?;
        db.conn.execute(
            "update cards set review_count = 5000000000 where card_id = 'huge';",
            [],
        )?;
        db.conn.execute(
            "update cards set review_count = -1 where card_id = 'negative';",
            [],
        )?;
        let ids: Vec<String> = db
            .load_cards("deck")?
            .into_iter()
            .map(|c| c.id.to_string())
            .collect();
        assert_eq!(ids, vec!["ok"]);
        Ok(())
    }

    #[test]
    fn test_null_review_count_means_new() -> Fallible<()> {
        let (_dir, mut db) = open()?;
        db.save_cards("deck", &[reviewed_card("a", 4, 1.0, 9.0)])?;
        db.conn
            .execute("update cards set review_count = null;", [])?;
        let cards = db.load_cards("deck")?;
        assert!(cards[0].is_new());
        Ok(())
    }

    #[test]
    fn test_list_and_clear_decks() -> Fallible<()> {
        let (_dir, mut db) = open()?;
        db.save_cards("spanish", &[card("a")])?;
        db.save_cards("rust", &[card("b")])?;
        assert_eq!(db.list_decks()?, vec!["rust", "spanish"]);
        db.clear_deck("rust")?;
        assert_eq!(db.list_decks()?, vec!["spanish"]);
        Ok(())
    }

    #[test]
    fn test_queue_config_roundtrip() -> Fallible<()> {
        let (_dir, mut db) = open()?;
        assert!(db.load_queue_config()?.is_none());
        let mut config = ReviewQueueConfig::new(25, now().local_date());
        config.new_cards_studied_today = 3;
        db.save_queue_config(&config)?;
        config.new_cards_studied_today = 4;
        db.save_queue_config(&config)?;
        assert_eq!(db.load_queue_config()?, Some(config));
        Ok(())
    }

    #[test]
    fn test_malformed_queue_config_is_ignored() -> Fallible<()> {
        let (_dir, mut db) = open()?;
        db.conn.execute(
            "insert into settings (key, value) values (?, 'not json');",
            [QUEUE_CONFIG_KEY],
        )?;
        assert!(db.load_queue_config()?.is_none());
        Ok(())
    }

    #[test]
    fn test_quiz_result_roundtrip() -> Fallible<()> {
        let (_dir, mut db) = open()?;
        let result = create_quiz_result(2, vec![CardId::new("a")], vec![CardId::new("b")]);
        db.save_quiz_result("deck", "ownership", &result)?;
        assert_eq!(db.load_quiz_result("deck", "ownership")?, Some(result));
        assert!(db.load_quiz_result("deck", "lifetimes")?.is_none());
        Ok(())
    }
}
