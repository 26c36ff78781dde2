//! Stock-platform category assignments produced alongside metadata.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stock platforms categories are generated for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StockPlatform {
    /// Two category slots (primary and secondary).
    Shutterstock,
    /// A single category slot.
    AdobeStock,
}

impl StockPlatform {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockPlatform::Shutterstock => "shutterstock",
            StockPlatform::AdobeStock => "adobe_stock",
        }
    }

    /// Number of category slots the platform accepts.
    pub fn slot_count(&self) -> u8 {
        match self {
            StockPlatform::Shutterstock => 2,
            StockPlatform::AdobeStock => 1,
        }
    }

    pub fn accepts(&self, slot: CategorySlot) -> bool {
        slot.number() <= self.slot_count()
    }
}

impl fmt::Display for StockPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("Unknown stock platform '{0}'")]
pub struct ParsePlatformError(String);

impl FromStr for StockPlatform {
    type Err = ParsePlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shutterstock" => Ok(StockPlatform::Shutterstock),
            "adobe_stock" => Ok(StockPlatform::AdobeStock),
            other => Err(ParsePlatformError(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum CategorySlot {
    Primary,
    Secondary,
}

impl CategorySlot {
    pub fn number(&self) -> u8 {
        match self {
            CategorySlot::Primary => 1,
            CategorySlot::Secondary => 2,
        }
    }

    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(CategorySlot::Primary),
            2 => Some(CategorySlot::Secondary),
            _ => None,
        }
    }
}

/// One category chosen for one platform slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryAssignment {
    pub platform: StockPlatform,
    pub slot: CategorySlot,
    pub category_id: String,
    pub category_name: String,
}

impl CategoryAssignment {
    pub fn new(
        platform: StockPlatform,
        slot: CategorySlot,
        category_id: impl Into<String>,
        category_name: impl Into<String>,
    ) -> Self {
        Self {
            platform,
            slot,
            category_id: category_id.into(),
            category_name: category_name.into(),
        }
    }

    /// An assignment is storable when the platform has the slot and an id is set.
    pub fn is_valid(&self) -> bool {
        self.platform.accepts(self.slot) && !self.category_id.trim().is_empty()
    }
}
