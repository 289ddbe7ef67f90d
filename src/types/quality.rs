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

use serde::Deserialize;
use serde::Serialize;

use crate::error::Fallible;
use crate::error::fail;

/// How well a card was recalled, on a 0-5 scale. Grades 0-2 mean the card
/// was forgotten or nearly so, grades 3-5 mean it was recalled.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct ReviewQuality(u8);

impl ReviewQuality {
    pub const BLACKOUT: Self = Self(0);
    pub const INCORRECT: Self = Self(1);
    pub const HARD: Self = Self(2);
    pub const DIFFICULT: Self = Self(3);
    pub const GOOD: Self = Self(4);
    pub const PERFECT: Self = Self(5);

    pub const MAX: u8 = 5;

    pub fn new(value: u8) -> Fallible<Self> {
        if value > Self::MAX {
            return fail(format!(
                "review quality must be between 0 and {}, got {value}",
                Self::MAX
            ));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Whether the review counts as a successful recall.
    pub fn is_correct(self) -> bool {
        self.0 >= 3
    }

    pub(crate) fn as_f64(self) -> f64 {
        self.0 as f64
    }
}

impl TryFrom<u8> for ReviewQuality {
    type Error = crate::error::ErrorReport;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ReviewQuality> for u8 {
    fn from(value: ReviewQuality) -> Self {
        value.0
    }
}

impl Display for ReviewQuality {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
