use std::error::Error;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Floor applied to every adjusted priority.
pub const MIN_PRIORITY: f64 = 0.1;
/// Step used by the interactive `+`/`-` adjustments.
pub const PRIORITY_STEP: f64 = 0.1;
pub const DEFAULT_PRIORITY: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub name: String,
    pub priority: f64,
}

impl Activity {
    pub fn new(name: impl Into<String>, priority: f64) -> Self {
        Self {
            name: name.into(),
            priority,
        }
    }
}

/// Rounds to one decimal place, half away from zero.
pub fn round_priority(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Applies `delta` to `current`, rounding to one decimal and clamping at
/// [`MIN_PRIORITY`]. Both interactive adjustments and queue replay go through
/// this so they agree on the result.
pub fn adjusted_priority(current: f64, delta: f64) -> f64 {
    round_priority(current + delta).max(MIN_PRIORITY)
}

pub fn normalize_name(raw: &str) -> Result<String, InvalidActivity> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(InvalidActivity::EmptyName);
    }
    Ok(trimmed.to_string())
}

pub fn validate_priority(value: f64) -> Result<f64, InvalidActivity> {
    if !value.is_finite() {
        return Err(InvalidActivity::NonFinitePriority(value));
    }
    if value < MIN_PRIORITY {
        return Err(InvalidActivity::PriorityBelowFloor(value));
    }
    Ok(value)
}

#[derive(Debug, Clone, PartialEq)]
pub enum InvalidActivity {
    EmptyName,
    NonFinitePriority(f64),
    PriorityBelowFloor(f64),
}

impl fmt::Display for InvalidActivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidActivity::EmptyName => write!(f, "activity name is required"),
            InvalidActivity::NonFinitePriority(value) => {
                write!(f, "priority must be a finite number, got {}", value)
            }
            InvalidActivity::PriorityBelowFloor(value) => write!(
                f,
                "priority {} is below the minimum of {}",
                value, MIN_PRIORITY
            ),
        }
    }
}

impl Error for InvalidActivity {}
