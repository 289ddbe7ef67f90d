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

use crate::types::timestamp::Timestamp;

/// Progress through one sitting of study.
#[derive(Clone, PartialEq, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudySession {
    pub start_time: Timestamp,
    pub cards_reviewed: usize,
    /// Whole seconds elapsed as of the last time update.
    pub time_spent: u64,
}

pub fn create_study_session(start_time: Timestamp) -> StudySession {
    StudySession {
        start_time,
        cards_reviewed: 0,
        time_spent: 0,
    }
}

pub fn update_session_time(session: &StudySession, now: Timestamp) -> StudySession {
    let elapsed = session.start_time.millis_until(now).max(0) / 1000;
    StudySession {
        time_spent: elapsed as u64,
        ..session.clone()
    }
}

pub fn increment_cards_reviewed(session: &StudySession) -> StudySession {
    StudySession {
        cards_reviewed: session.cards_reviewed + 1,
        ..session.clone()
    }
}
