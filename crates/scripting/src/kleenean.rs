//! Three-valued logic used for delay tracking

use std::fmt;

/// A tri-state truth value: no / maybe / yes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Kleenean {
    #[default]
    False,
    Unknown,
    True,
}

impl Kleenean {
    pub fn is_true(self) -> bool {
        self == Kleenean::True
    }

    pub fn is_false(self) -> bool {
        self == Kleenean::False
    }

    pub fn is_unknown(self) -> bool {
        self == Kleenean::Unknown
    }

    /// `True` or `Unknown`
    pub fn is_possible(self) -> bool {
        self != Kleenean::False
    }

    pub fn and(self, other: Kleenean) -> Kleenean {
        match (self, other) {
            (Kleenean::False, _) | (_, Kleenean::False) => Kleenean::False,
            (Kleenean::True, Kleenean::True) => Kleenean::True,
            _ => Kleenean::Unknown,
        }
    }

    pub fn or(self, other: Kleenean) -> Kleenean {
        match (self, other) {
            (Kleenean::True, _) | (_, Kleenean::True) => Kleenean::True,
            (Kleenean::False, Kleenean::False) => Kleenean::False,
            _ => Kleenean::Unknown,
        }
    }

    pub fn not(self) -> Kleenean {
        match self {
            Kleenean::False => Kleenean::True,
            Kleenean::Unknown => Kleenean::Unknown,
            Kleenean::True => Kleenean::False,
        }
    }

    /// Merge the outcomes of alternative branches: agreement keeps the
    /// value, any disagreement yields `Unknown`.
    pub fn merge_branches<I: IntoIterator<Item = Kleenean>>(branches: I) -> Kleenean {
        let mut iter = branches.into_iter();
        let Some(first) = iter.next() else {
            return Kleenean::False;
        };
        if iter.all(|k| k == first) {
            first
        } else {
            Kleenean::Unknown
        }
    }
}

impl From<bool> for Kleenean {
    fn from(value: bool) -> Self {
        if value {
            Kleenean::True
        } else {
            Kleenean::False
        }
    }
}

impl fmt::Display for Kleenean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kleenean::False => write!(f, "no"),
            Kleenean::Unknown => write!(f, "maybe"),
            Kleenean::True => write!(f, "yes"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logic_tables() {
        assert_eq!(Kleenean::True.and(Kleenean::Unknown), Kleenean::Unknown);
        assert_eq!(Kleenean::False.and(Kleenean::Unknown), Kleenean::False);
        assert_eq!(Kleenean::True.or(Kleenean::Unknown), Kleenean::True);
        assert_eq!(Kleenean::Unknown.not(), Kleenean::Unknown);
    }

    #[test]
    fn test_merge_branches() {
        assert_eq!(Kleenean::merge_branches([Kleenean::True, Kleenean::True]), Kleenean::True);
        assert_eq!(Kleenean::merge_branches([Kleenean::True, Kleenean::False]), Kleenean::Unknown);
        assert_eq!(
            Kleenean::merge_branches([Kleenean::False, Kleenean::False, Kleenean::Unknown]),
            Kleenean::Unknown
        );
    }
}
