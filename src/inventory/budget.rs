//! Remaining-key counter.
//!
//! The key manager advertises a finite supply of keys. The counter starts at
//! the configured budget minus the keys already on record and drops by one
//! per issued key. It is allowed to go below zero: exhaustion is reported,
//! not enforced.

/// Tracks how many keys the inventory still advertises.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBudget {
    initial: i64,
    issued: u64,
}

impl KeyBudget {
    /// Budget of `initial` keys of which `already_issued` are on record.
    pub fn new(initial: i64, already_issued: usize) -> Self {
        Self {
            initial,
            issued: already_issued as u64,
        }
    }

    pub fn remaining(&self) -> i64 {
        self.initial.saturating_sub(self.issued as i64)
    }

    /// Records `count` newly issued keys and returns the new remaining value.
    pub fn consume(&mut self, count: u64) -> i64 {
        self.issued = self.issued.saturating_add(count);
        self.remaining()
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() <= 0
    }
}
