use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

/// Summed token counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenTotals {
    pub input: u64,
    pub output: u64,
    pub total: u64,
}

impl TokenTotals {
    pub fn new(input: u64, output: u64, total: u64) -> Self {
        Self {
            input,
            output,
            total,
        }
    }
}

impl Add for TokenTotals {
    type Output = TokenTotals;

    fn add(self, rhs: Self) -> Self::Output {
        TokenTotals {
            input: self.input + rhs.input,
            output: self.output + rhs.output,
            total: self.total + rhs.total,
        }
    }
}

impl AddAssign for TokenTotals {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}
