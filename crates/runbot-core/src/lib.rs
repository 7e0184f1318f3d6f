//! Foundational low-level utilities shared across runbot crates.
//!
//! Provides the clock helpers used for relay subscription windows and the
//! text truncation applied to outgoing replies.

pub mod text_utils;
pub mod time_utils;

pub use text_utils::{is_blank, truncate_for_reply};
pub use time_utils::{clamp_to_now, current_unix_timestamp};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_clamp_to_now_caps_future_timestamps_only() {
        let now = current_unix_timestamp();
        assert!(now > 1_700_000_000);
        assert_eq!(clamp_to_now(1_700_000_000), 1_700_000_000);
        assert!(clamp_to_now(u64::MAX) <= current_unix_timestamp());
    }

    #[test]
    fn unit_text_helpers_are_reexported() {
        assert_eq!(truncate_for_reply("abcdef", 4), "a...");
        assert!(is_blank(" \t"));
    }
}
