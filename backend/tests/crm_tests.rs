//! CRM display-id tests

use shared::validation::{format_display_id, next_display_id, parse_display_id_sequence};

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn display_id_format() {
        assert_eq!(format_display_id(2026, 1), "LC-2026-CUST-0001");
        assert_eq!(format_display_id(2026, 123), "LC-2026-CUST-0123");
        // Sequences past four digits keep their full width
        assert_eq!(format_display_id(2026, 12345), "LC-2026-CUST-12345");
    }

    #[test]
    fn parse_rejects_other_years_and_garbage() {
        assert_eq!(parse_display_id_sequence("LC-2026-CUST-0042", 2026), Some(42));
        assert_eq!(parse_display_id_sequence("LC-2025-CUST-0042", 2026), None);
        assert_eq!(parse_display_id_sequence("LC-2026-CUST-", 2026), None);
        assert_eq!(parse_display_id_sequence("not-an-id", 2026), None);
    }

    #[test]
    fn sequence_restarts_each_year() {
        let existing = ["LC-2025-CUST-0400"];
        assert_eq!(
            next_display_id(2026, existing.iter().copied()),
            "LC-2026-CUST-0001"
        );
    }

    #[test]
    fn sequence_skips_holes_to_the_max() {
        let existing = [
            "LC-2026-CUST-0002",
            "LC-2026-CUST-0009",
            "LC-2026-CUST-0005",
        ];
        assert_eq!(
            next_display_id(2026, existing.iter().copied()),
            "LC-2026-CUST-0010"
        );
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Formatting then parsing returns the sequence
        #[test]
        fn prop_format_parse_round_trip(year in 2000i32..2100, seq in 1u32..100_000) {
            let id = format_display_id(year, seq);
            prop_assert_eq!(parse_display_id_sequence(&id, year), Some(seq));
        }

        /// The generated id is always one past the year's maximum
        #[test]
        fn prop_next_is_max_plus_one(seqs in proptest::collection::vec(1u32..9_999, 1..20)) {
            let ids: Vec<String> = seqs.iter().map(|s| format_display_id(2026, *s)).collect();
            let next = next_display_id(2026, ids.iter().map(|s| s.as_str()));
            let max = seqs.iter().max().unwrap();
            prop_assert_eq!(next, format_display_id(2026, max + 1));
        }
    }
}
