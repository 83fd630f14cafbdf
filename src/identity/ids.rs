use serde::{ Deserialize, Serialize };
use std::fmt;
use uuid::Uuid;

/// Random non-zero id taken from the high half of a v4 UUID.
pub fn generate_u64() -> u64 {
    loop {
        let (high, _) = Uuid::new_v4().as_u64_pair();
        if high != 0 {
            return high;
        }
    }
}

/// Parses a stored id; empty, zero or non-numeric input yields `None`.
pub fn parse_stored(raw: &str) -> Option<u64> {
    raw.trim().parse::<u64>().ok().filter(|id| *id != 0)
}

macro_rules! define_identity_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            pub fn generate() -> Self {
                Self(generate_u64())
            }

            /// Zero is reserved as "no id".
            pub fn from_raw(raw: u64) -> Option<Self> {
                (raw != 0).then_some(Self(raw))
            }

            pub fn parse(raw: &str) -> Option<Self> {
                parse_stored(raw).map(Self)
            }

            pub fn get(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$name> for u64 {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

define_identity_id!(UserId);
define_identity_id!(ConversationId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_values_are_absent() {
        for raw in ["", "0", "NaN", "-5", "12abc", "   "] {
            assert_eq!(UserId::parse(raw), None, "{:?} should be rejected", raw);
        }
        assert_eq!(ConversationId::from_raw(0), None);
    }

    #[test]
    fn valid_values_round_trip_through_text() {
        let id = ConversationId::parse(" 18446744073709551615 ").unwrap();
        assert_eq!(id.get(), u64::MAX);
        assert_eq!(ConversationId::parse(&id.to_string()), Some(id));
    }

    #[test]
    fn generated_ids_are_non_zero_and_distinct() {
        let a = UserId::generate();
        let b = UserId::generate();
        assert_ne!(a.get(), 0);
        assert_ne!(a, b);
    }
}
