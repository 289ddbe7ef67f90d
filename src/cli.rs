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
use std::io::BufRead;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;
use serde::Deserialize;
use serde::Serialize;

use crate::db::Database;
use crate::error::ErrorReport;
use crate::error::Fallible;
use crate::error::fail;
use crate::queue::QueueStats;
use crate::queue::build_review_queue;
use crate::queue::increment_new_cards_studied;
use crate::queue::load_queue_config_or;
use crate::queue::queue_stats;
use crate::queue::update_max_new_cards_per_day;
use crate::quiz::QuizResult;
use crate::quiz::create_quiz_tracking_state;
use crate::quiz::filter_cards_for_quiz;
use crate::quiz::incorrect_card_ids_from_quiz;
use crate::quiz::is_quiz_complete;
use crate::quiz::next_card_index;
use crate::quiz::quiz_result_from_state;
use crate::quiz::save_quiz_result;
use crate::quiz::track_quiz_answer;
use crate::review::days_since_card_created;
use crate::review::days_since_last_review;
use crate::review::process_card_review;
use crate::review::reset_card_state;
use crate::scheduler::days_until_due;
use crate::session::StudySession;
use crate::session::create_study_session;
use crate::session::increment_cards_reviewed;
use crate::session::update_session_time;
use crate::settings::DEFAULT_SETTINGS_PATH;
use crate::settings::Settings;
use crate::stats::CollectionStatistics;
use crate::stats::calculate_statistics;
use crate::status::CardStatus;
use crate::status::card_status;
use crate::status::filter_cards_by_status;
use crate::status::filter_cards_by_tag;
use crate::status::search_cards;
use crate::storage::Storage;
use crate::types::card::Card;
use crate::types::card_id::CardId;
use crate::types::quality::ReviewQuality;
use crate::types::timestamp::Timestamp;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the settings file.
    #[arg(long, global = true, default_value = DEFAULT_SETTINGS_PATH)]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import cards from a JSON file into a deck.
    Import {
        deck: String,
        /// A JSON array of objects with `front`, `back` and optional `tags`.
        file: PathBuf,
    },
    /// Show today's review queue for a deck.
    Queue { deck: String },
    /// Record a review of one card.
    Review {
        deck: String,
        card_id: String,
        /// Recall quality, from 0 (blackout) to 5 (perfect).
        quality: u8,
    },
    /// Study today's queue interactively.
    Study { deck: String },
    /// Take a single-chance quiz over a deck.
    Quiz {
        deck: String,
        /// Results are stored per deck and topic.
        #[arg(long, default_value = "all")]
        topic: String,
        /// Only ask the cards missed in the previous quiz on this topic.
        #[arg(long)]
        incorrect_only: bool,
    },
    /// List the cards of a deck, optionally filtered.
    List {
        deck: String,
        /// One of new, learning, review or mastered.
        #[arg(long)]
        status: Option<CardStatus>,
        #[arg(long)]
        tag: Option<String>,
        /// Only cards whose front or back contains this text.
        #[arg(long)]
        search: Option<String>,
    },
    /// Show collection statistics for a deck.
    Stats { deck: String },
    /// Set the daily limit on new cards.
    SetLimit { max_new_cards: u32 },
    /// List the decks that have cards.
    Decks,
    /// Forget a card's scheduling progress.
    Reset { deck: String, card_id: String },
    /// Write a settings file with the default values.
    Init,
}

pub fn entrypoint() -> Fallible<()> {
    let cli: Cli = Cli::parse();
    if let Command::Init = cli.command {
        init_settings(&cli.config)?;
        println!("Wrote {}.", cli.config.display());
        return Ok(());
    }
    let settings = Settings::load(&cli.config)?;
    let db_path = settings
        .database
        .to_str()
        .ok_or_else(|| ErrorReport::new("invalid database path"))?;
    let mut db = Database::new(db_path)?;
    let default_max = settings.default_max_new_cards_per_day;
    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let mut output = std::io::stdout();
    match cli.command {
        Command::Import { deck, file } => {
            let json = std::fs::read_to_string(&file)?;
            let (added, skipped) = import_cards(&mut db, &deck, &json, Timestamp::now())?;
            println!("Imported {added} cards into {deck} ({skipped} already present).");
        }
        Command::Queue { deck } => {
            let report = show_queue(&db, &deck, default_max, Timestamp::now())?;
            print_json(&report)?;
        }
        Command::Review {
            deck,
            card_id,
            quality,
        } => {
            let quality = ReviewQuality::new(quality)?;
            let card_id = CardId::new(card_id);
            let report = record_review(&mut db, &deck, &card_id, quality, Timestamp::now())?;
            print_json(&report)?;
        }
        Command::Study { deck } => {
            study(&mut db, &deck, default_max, &mut input, &mut output, &Timestamp::now)?;
        }
        Command::Quiz {
            deck,
            topic,
            incorrect_only,
        } => {
            quiz(
                &mut db,
                &deck,
                &topic,
                incorrect_only,
                &mut input,
                &mut output,
                &Timestamp::now,
            )?;
        }
        Command::List {
            deck,
            status,
            tag,
            search,
        } => {
            let listing = list_cards(
                &db,
                &deck,
                status,
                tag.as_deref(),
                search.as_deref(),
                Timestamp::now(),
            )?;
            print_json(&listing)?;
        }
        Command::Stats { deck } => {
            let cards = db.load_cards(&deck)?;
            let stats: CollectionStatistics = calculate_statistics(&cards, Timestamp::now());
            print_json(&stats)?;
        }
        Command::SetLimit { max_new_cards } => {
            let config = update_max_new_cards_per_day(&mut db, max_new_cards, Timestamp::now())?;
            println!(
                "New cards per day: {} ({} studied today).",
                config.max_new_cards_per_day, config.new_cards_studied_today
            );
        }
        Command::Decks => {
            for deck in db.list_decks()? {
                println!("{deck}");
            }
        }
        Command::Reset { deck, card_id } => {
            reset_card(&mut db, &deck, &CardId::new(card_id), Timestamp::now())?;
            println!("Card reset.");
        }
        // Handled before the database is opened.
        Command::Init => {}
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Fallible<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}

fn init_settings(path: &Path) -> Fallible<()> {
    if path.exists() {
        return fail(format!("{} already exists.", path.display()));
    }
    Settings::default().save(path)
}

#[derive(Deserialize)]
struct ImportedCard {
    front: String,
    back: String,
    #[serde(default)]
    tags: BTreeSet<String>,
}

/// Append the cards described by `json` to a deck. Returns the number of
/// cards added and the number skipped because the deck already had them.
fn import_cards(
    storage: &mut dyn Storage,
    deck: &str,
    json: &str,
    now: Timestamp,
) -> Fallible<(usize, usize)> {
    let imported: Vec<ImportedCard> = serde_json::from_str(json)?;
    let mut cards = storage.load_cards(deck)?;
    let mut known: BTreeSet<CardId> = cards.iter().map(|card| card.id.clone()).collect();
    let mut added = 0;
    let mut skipped = 0;
    for entry in imported {
        if entry.front.trim().is_empty() || entry.back.trim().is_empty() {
            log::warn!("Skipping card with an empty side.");
            skipped += 1;
            continue;
        }
        let card = Card::new(entry.front, entry.back, entry.tags, now);
        if known.insert(card.id.clone()) {
            cards.push(card);
            added += 1;
        } else {
            skipped += 1;
        }
    }
    storage.save_cards(deck, &cards)?;
    Ok((added, skipped))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueueReport {
    stats: QueueStats,
    cards: Vec<QueueEntry>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueueEntry {
    id: CardId,
    front: String,
    status: CardStatus,
    days_until_due: i64,
}

fn show_queue(
    storage: &dyn Storage,
    deck: &str,
    default_max: u32,
    now: Timestamp,
) -> Fallible<QueueReport> {
    let cards = storage.load_cards(deck)?;
    let config = load_queue_config_or(storage, default_max, now)?;
    let queue = build_review_queue(&cards, &config, now);
    let entries = queue
        .all_cards
        .iter()
        .map(|card| QueueEntry {
            id: card.id.clone(),
            front: card.front.clone(),
            status: card_status(card),
            days_until_due: days_until_due(card, now),
        })
        .collect();
    Ok(QueueReport {
        stats: queue_stats(&queue, &config),
        cards: entries,
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CardListing {
    id: CardId,
    front: String,
    back: String,
    tags: BTreeSet<String>,
    status: CardStatus,
    days_until_due: i64,
    days_since_created: i64,
    days_since_last_review: Option<i64>,
}

/// The cards of a deck matching every given filter, in deck order.
fn list_cards(
    storage: &dyn Storage,
    deck: &str,
    status: Option<CardStatus>,
    tag: Option<&str>,
    search: Option<&str>,
    now: Timestamp,
) -> Fallible<Vec<CardListing>> {
    let cards = storage.load_cards(deck)?;
    let cards = filter_cards_by_status(&cards, status);
    let cards = filter_cards_by_tag(&cards, tag);
    let cards = search_cards(&cards, search.unwrap_or_default());
    let listing = cards
        .into_iter()
        .map(|card| CardListing {
            status: card_status(&card),
            days_until_due: days_until_due(&card, now),
            days_since_created: days_since_card_created(&card, now),
            days_since_last_review: days_since_last_review(&card, now),
            id: card.id,
            front: card.front,
            back: card.back,
            tags: card.tags,
        })
        .collect();
    Ok(listing)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReviewReport {
    id: CardId,
    quality: ReviewQuality,
    correct: bool,
    was_new: bool,
    next_review: Timestamp,
    stability: f64,
    difficulty: f64,
    status: CardStatus,
}

/// Grade one card, persist the deck, and charge the daily budget if the
/// card was new.
fn record_review(
    storage: &mut dyn Storage,
    deck: &str,
    card_id: &CardId,
    quality: ReviewQuality,
    now: Timestamp,
) -> Fallible<ReviewReport> {
    let mut cards = storage.load_cards(deck)?;
    let Some(index) = cards.iter().position(|card| &card.id == card_id) else {
        return fail(format!("no card {card_id} in deck {deck}."));
    };
    let outcome = process_card_review(&cards[index], quality, now);
    let card = outcome.updated_card.clone();
    cards[index] = outcome.updated_card;
    storage.save_cards(deck, &cards)?;
    if outcome.was_new_card {
        increment_new_cards_studied(storage, now)?;
    }
    Ok(ReviewReport {
        id: card.id.clone(),
        quality,
        correct: outcome.is_correct,
        was_new: outcome.was_new_card,
        next_review: outcome.next_review,
        stability: card.state.stability,
        difficulty: card.state.difficulty,
        status: card_status(&card),
    })
}

fn reset_card(
    storage: &mut dyn Storage,
    deck: &str,
    card_id: &CardId,
    now: Timestamp,
) -> Fallible<()> {
    let mut cards = storage.load_cards(deck)?;
    let Some(card) = cards.iter_mut().find(|card| &card.id == card_id) else {
        return fail(format!("no card {card_id} in deck {deck}."));
    };
    *card = reset_card_state(card, now);
    storage.save_cards(deck, &cards)
}

/// Walk through today's queue once. Returns the finished session.
fn study(
    storage: &mut dyn Storage,
    deck: &str,
    default_max: u32,
    input: &mut dyn BufRead,
    output: &mut dyn Write,
    clock: &dyn Fn() -> Timestamp,
) -> Fallible<StudySession> {
    let started_at = clock();
    let mut session = create_study_session(started_at);
    let cards = storage.load_cards(deck)?;
    let config = load_queue_config_or(storage, default_max, started_at)?;
    let queue = build_review_queue(&cards, &config, started_at).all_cards;
    if queue.is_empty() {
        writeln!(output, "No cards due.")?;
        return Ok(session);
    }
    writeln!(output, "{} cards due.", queue.len())?;
    let mut index = 0;
    loop {
        let card = &queue[index];
        let Some(quality) = ask(card, input, output)? else {
            break;
        };
        record_review(storage, deck, &card.id, quality, clock())?;
        session = increment_cards_reviewed(&session);
        index = next_card_index(index, queue.len(), false);
        if index == 0 {
            break;
        }
    }
    session = update_session_time(&session, clock());
    writeln!(
        output,
        "Reviewed {} cards in {}s.",
        session.cards_reviewed, session.time_spent
    )?;
    Ok(session)
}

/// Ask every card in the deck once. Returns the result if the quiz was
/// finished, or `None` if it was abandoned.
fn quiz(
    storage: &mut dyn Storage,
    deck: &str,
    topic: &str,
    incorrect_only: bool,
    input: &mut dyn BufRead,
    output: &mut dyn Write,
    clock: &dyn Fn() -> Timestamp,
) -> Fallible<Option<QuizResult>> {
    let previous = incorrect_card_ids_from_quiz(storage, deck, topic)?;
    let cards = filter_cards_for_quiz(&storage.load_cards(deck)?, incorrect_only, &previous);
    if cards.is_empty() {
        writeln!(output, "No cards to quiz.")?;
        return Ok(None);
    }
    let total = cards.len();
    let mut tracking = create_quiz_tracking_state();
    let mut index = 0;
    while !is_quiz_complete(&tracking, total) {
        let card = &cards[index];
        let Some(quality) = ask(card, input, output)? else {
            writeln!(output, "Quiz abandoned.")?;
            return Ok(None);
        };
        let report = record_review(storage, deck, &card.id, quality, clock())?;
        tracking = track_quiz_answer(&tracking, &card.id, report.correct);
        index = next_card_index(index, total, true);
    }
    let result = quiz_result_from_state(&tracking, total);
    save_quiz_result(storage, deck, topic, &result)?;
    writeln!(
        output,
        "Score: {}% ({} of {} correct).",
        result.score, result.correct_cards, result.total_cards
    )?;
    Ok(Some(result))
}

/// Show a card, wait for the reveal, and read a grade. `None` means the
/// user quit or input ended.
fn ask(
    card: &Card,
    input: &mut dyn BufRead,
    output: &mut dyn Write,
) -> Fallible<Option<ReviewQuality>> {
    writeln!(output, "Q: {}", card.front)?;
    writeln!(output, "[press enter to reveal]")?;
    if read_line(input)?.is_none() {
        return Ok(None);
    }
    writeln!(output, "A: {}", card.back)?;
    loop {
        writeln!(output, "Grade: (0-5, q to quit)")?;
        let Some(line) = read_line(input)? else {
            return Ok(None);
        };
        if line == "q" {
            return Ok(None);
        }
        match line.parse::<u8>().ok().map(ReviewQuality::new) {
            Some(Ok(quality)) => return Ok(Some(quality)),
            _ => writeln!(output, "Invalid input. Please enter a number between 0 and 5.")?,
        }
    }
}

fn read_line(input: &mut dyn BufRead) -> Fallible<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}
