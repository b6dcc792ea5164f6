//! Core type definitions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Trigger ID (32-bit unsigned, allocated in load order)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TriggerId(pub u32);

impl TriggerId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl From<u32> for TriggerId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl From<TriggerId> for u64 {
    fn from(id: TriggerId) -> Self {
        u64::from(id.0)
    }
}

impl TryFrom<u64> for TriggerId {
    type Error = std::num::TryFromIntError;

    fn try_from(value: u64) -> std::result::Result<Self, Self::Error> {
        u32::try_from(value).map(Self)
    }
}

impl fmt::Display for TriggerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A span of host ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Ticks(pub u64);

impl Ticks {
    pub const ONE: Ticks = Ticks(1);

    pub const fn new(ticks: u64) -> Self {
        Self(ticks)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Ticks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 1 {
            write!(f, "1 tick")
        } else {
            write!(f, "{} ticks", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticks_display() {
        assert_eq!(Ticks::ONE.to_string(), "1 tick");
        assert_eq!(Ticks::new(20).to_string(), "20 ticks");
    }

    #[test]
    fn test_trigger_id_ordering() {
        assert!(TriggerId::new(1) < TriggerId::new(2));
        assert_eq!(TriggerId::new(7).to_string(), "#7");
    }
}
