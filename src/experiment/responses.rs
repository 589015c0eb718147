//! Response keys, counterbalancing, and recoding.

use serde::{Deserialize, Serialize};

use crate::domain::Response;
use crate::experiment::schedule::Phase;

/// Subjects with IDs at or above this value run practice sessions.
pub const PRACTICE_SUBJECT_MIN: u32 = 900;

pub fn is_practice(subject: u32) -> bool {
    subject >= PRACTICE_SUBJECT_MIN
}

/// Arrow key used to answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKey {
    Left,
    Right,
}

impl ResponseKey {
    pub fn label(self) -> &'static str {
        match self {
            ResponseKey::Left => "left",
            ResponseKey::Right => "right",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "left" => Some(ResponseKey::Left),
            "right" => Some(ResponseKey::Right),
            _ => None,
        }
    }
}

/// Which arrow key means "synchronous".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Counterbalance {
    LeftSync,
    RightSync,
}

impl Counterbalance {
    /// Even subject IDs answer "synchronous" with the left key.
    pub fn for_subject(subject: u32) -> Self {
        if subject % 2 == 0 {
            Counterbalance::LeftSync
        } else {
            Counterbalance::RightSync
        }
    }

    /// Phase B uses a fixed right = synchronous mapping for everyone.
    pub fn for_phase(phase: Phase, subject: u32) -> Self {
        match phase {
            Phase::A => Self::for_subject(subject),
            Phase::B => Counterbalance::RightSync,
        }
    }

    pub fn sync_key(self) -> ResponseKey {
        match self {
            Counterbalance::LeftSync => ResponseKey::Left,
            Counterbalance::RightSync => ResponseKey::Right,
        }
    }

    /// Recode a key press into a judgment.
    pub fn recode(self, key: Option<ResponseKey>) -> Response {
        match key {
            None => Response::Missing,
            Some(k) if k == self.sync_key() => Response::Sync,
            Some(_) => Response::Async,
        }
    }

    /// Recode a raw key label as logged (`left`, `right`, `NaN`).
    ///
    /// Returns `None` for labels that are neither a key nor a missing marker.
    pub fn recode_label(self, label: &str) -> Option<Response> {
        if let Some(key) = ResponseKey::parse(label) {
            return Some(self.recode(Some(key)));
        }
        match Response::parse(label) {
            Some(Response::Missing) => Some(Response::Missing),
            _ => None,
        }
    }

    /// Key that produces `response`, if any.
    pub fn key_for(self, response: Response) -> Option<ResponseKey> {
        match (response, self) {
            (Response::Missing, _) => None,
            (Response::Sync, cb) => Some(cb.sync_key()),
            (Response::Async, Counterbalance::LeftSync) => Some(ResponseKey::Right),
            (Response::Async, Counterbalance::RightSync) => Some(ResponseKey::Left),
        }
    }
}
