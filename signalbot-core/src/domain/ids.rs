use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier of a simulated open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Ticket(pub u64);

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for Ticket {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Issues strictly increasing tickets derived from wall-clock milliseconds.
///
/// Two tickets issued within the same millisecond (or after a clock step
/// backwards) still differ: the next ticket is always at least `last + 1`.
#[derive(Debug, Clone, Default)]
pub struct TicketSequence {
    last: u64,
}

impl TicketSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next ticket given the current time in epoch milliseconds.
    pub fn next_at(&mut self, now_millis: i64) -> Ticket {
        let candidate = u64::try_from(now_millis).unwrap_or(0);
        self.last = candidate.max(self.last + 1);
        Ticket(self.last)
    }

    pub fn next(&mut self) -> Ticket {
        self.next_at(chrono::Utc::now().timestamp_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tickets_follow_the_clock() {
        let mut seq = TicketSequence::new();
        assert_eq!(seq.next_at(1_700_000_000_000), Ticket(1_700_000_000_000));
        assert_eq!(seq.next_at(1_700_000_000_500), Ticket(1_700_000_000_500));
    }

    #[test]
    fn same_millisecond_still_unique() {
        let mut seq = TicketSequence::new();
        let a = seq.next_at(1_000);
        let b = seq.next_at(1_000);
        let c = seq.next_at(999); // clock stepped back
        assert!(a < b && b < c);
    }

    #[test]
    fn ticket_display() {
        assert_eq!(Ticket(42).to_string(), "#42");
    }
}
