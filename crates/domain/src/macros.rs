//! Macro for string conversions on fieldless enums
//!
//! Request states, HTTP methods and error kinds all travel through logs and
//! persisted metadata as short lowercase names. This macro generates the
//! `as_str`, `Display` and `FromStr` implementations from a single mapping.
//!
//! # Example
//!
//! ```rust
//! use lrsync_domain::impl_wire_name_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum FlushPhase {
//!     Idle,
//!     Dispatching,
//! }
//!
//! impl_wire_name_conversions!(FlushPhase {
//!     Idle => "idle",
//!     Dispatching => "dispatching",
//! });
//!
//! assert_eq!(FlushPhase::Idle.as_str(), "idle");
//! assert_eq!("DISPATCHING".parse::<FlushPhase>().ok(), Some(FlushPhase::Dispatching));
//! ```

/// Implements `as_str`, `Display` and `FromStr` for a fieldless enum.
///
/// Parsing is case-insensitive; output is always the mapped name.
#[macro_export]
macro_rules! impl_wire_name_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl $enum_name {
            /// Stable wire name of this variant.
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $str,)+
                }
            }
        }

        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                let lowered = s.to_ascii_lowercase();
                $(if lowered == $str {
                    return Ok(Self::$variant);
                })+
                Err(format!("Invalid {}: {}", stringify!($enum_name), s))
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Delivery {
        Queued,
        InFlight,
        Persisted,
    }

    impl_wire_name_conversions!(Delivery {
        Queued => "queued",
        InFlight => "in_flight",
        Persisted => "persisted",
    });

    #[test]
    fn display_uses_wire_name() {
        assert_eq!(Delivery::Queued.to_string(), "queued");
        assert_eq!(Delivery::InFlight.to_string(), "in_flight");
        assert_eq!(Delivery::Persisted.as_str(), "persisted");
    }

    #[test]
    fn parsing_ignores_case() {
        assert_eq!(Delivery::from_str("IN_FLIGHT"), Ok(Delivery::InFlight));
        assert_eq!(Delivery::from_str("Persisted"), Ok(Delivery::Persisted));
    }

    mod shadowed_result {
        #[allow(dead_code)]
        pub type Result<T> = std::result::Result<T, ()>;

        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum Phase {
            Idle,
        }

        impl_wire_name_conversions!(Phase {
            Idle => "idle",
        });
    }

    #[test]
    fn expands_next_to_a_local_result_alias() {
        assert_eq!(shadowed_result::Phase::from_str("IDLE"), Ok(shadowed_result::Phase::Idle));
    }

    #[test]
    fn parsing_rejects_unknown_names() {
        let err = Delivery::from_str("lost").unwrap_err();
        assert!(err.contains("Delivery"));
        assert!(err.contains("lost"));
    }
}
