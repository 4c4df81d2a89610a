//! Stock ledger tests
//!
//! Exercises the running-balance replay engine:
//! - running-balance correctness against a reference replay
//! - floor-at-zero under arbitrary subtractions
//! - transfer conservation between locations
//! - snapshot override for Nairobi Partner
//! - location/transaction-type enforcement
//! - deterministic same-day ordering

use chrono::{NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use shared::ledger;
use shared::models::{Location, StockMovement, TransactionType, Unit};
use shared::validation::validate_location_transaction;

fn dec(n: i64) -> Decimal {
    Decimal::from(n)
}

fn date(offset_days: i64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(offset_days)
}

/// Movement with every quantity zeroed; tests fill in what they need.
/// `created_seq` becomes the creation timestamp (None = legacy row).
fn movement(
    location: Location,
    transaction_type: TransactionType,
    date: NaiveDate,
    created_seq: Option<i64>,
) -> StockMovement {
    StockMovement {
        id: Uuid::new_v4(),
        product_id: Uuid::nil(),
        tds_id: None,
        date,
        location,
        transaction_type,
        unit: Unit::Kg,
        beginning_balance: Decimal::ZERO,
        purchase_kg: Decimal::ZERO,
        sold_kg: Decimal::ZERO,
        purchase_direct_shipment_kg: Decimal::ZERO,
        sold_direct_shipment_kg: Decimal::ZERO,
        sample_or_damage_kg: Decimal::ZERO,
        inter_company_transfer_kg: Decimal::ZERO,
        transfer_to_location: None,
        balance_kg: Decimal::ZERO,
        supplier_id: None,
        supplier_name: None,
        customer_id: None,
        customer_name: None,
        business_model: None,
        brand: None,
        reference: None,
        remark: None,
        warehouse: None,
        created_at: created_seq.map(|s| Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
            + chrono::Duration::seconds(s)),
        updated_at: None,
    }
}

fn purchase(location: Location, date: NaiveDate, seq: i64, kg: i64) -> StockMovement {
    let mut m = movement(location, TransactionType::Purchase, date, Some(seq));
    m.purchase_kg = dec(kg);
    m
}

fn sale(location: Location, date: NaiveDate, seq: i64, kg: i64) -> StockMovement {
    let mut m = movement(location, TransactionType::Sales, date, Some(seq));
    m.sold_kg = dec(kg);
    m
}

fn transfer(
    from: Location,
    to: Location,
    date: NaiveDate,
    seq: i64,
    kg: i64,
) -> StockMovement {
    let mut m = movement(from, TransactionType::InterCompanyTransfer, date, Some(seq));
    m.inter_company_transfer_kg = dec(kg);
    m.transfer_to_location = Some(to);
    m
}

fn snapshot(date: NaiveDate, seq: i64, count: i64) -> StockMovement {
    let mut m = movement(
        Location::NairobiPartner,
        TransactionType::StockAvailability,
        date,
        Some(seq),
    );
    m.beginning_balance = dec(count);
    m.balance_kg = dec(count);
    m
}

fn final_balances(movements: &[StockMovement], location: Location) -> Vec<Decimal> {
    let entries = ledger::entries_affecting(movements, location);
    ledger::replay(&entries)
        .into_iter()
        .map(|r| r.balance_kg)
        .collect()
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// The worked example: M1 and M2 build a chain, then M3 lands
    /// retroactively on M1's date and the chain re-sorts
    #[test]
    fn retroactive_insert_resorts_chain() {
        let m1 = purchase(Location::AddisAbaba, date(0), 0, 100);
        let m2 = sale(Location::AddisAbaba, date(1), 1, 30);

        let movements = vec![m1.clone(), m2.clone()];
        assert_eq!(
            final_balances(&movements, Location::AddisAbaba),
            vec![dec(100), dec(70)]
        );

        // M3 shares M1's date but was created later, so it sorts between
        // M1 and M2
        let m3 = purchase(Location::AddisAbaba, date(0), 2, 20);
        let movements = vec![m1, m2, m3];
        assert_eq!(
            final_balances(&movements, Location::AddisAbaba),
            vec![dec(100), dec(120), dec(90)]
        );
    }

    /// Insertion order must not matter; only (date, created_at) does
    #[test]
    fn replay_is_insertion_order_independent() {
        let a = purchase(Location::AddisAbaba, date(0), 0, 100);
        let b = sale(Location::AddisAbaba, date(2), 1, 40);
        let c = purchase(Location::AddisAbaba, date(4), 2, 15);

        let forward = vec![a.clone(), b.clone(), c.clone()];
        let backward = vec![c, b, a];

        assert_eq!(
            final_balances(&forward, Location::AddisAbaba),
            final_balances(&backward, Location::AddisAbaba)
        );
    }

    /// Two same-day movements yield the same chain regardless of which was
    /// handed to the engine first
    #[test]
    fn same_day_ordering_is_deterministic() {
        let first = purchase(Location::AddisAbaba, date(0), 0, 50);
        let second = sale(Location::AddisAbaba, date(0), 1, 20);

        let one_way = vec![first.clone(), second.clone()];
        let other_way = vec![second, first];

        let balances = final_balances(&one_way, Location::AddisAbaba);
        assert_eq!(balances, final_balances(&other_way, Location::AddisAbaba));
        assert_eq!(balances, vec![dec(50), dec(30)]);
    }

    /// Entries without a creation timestamp sort before timestamped ones on
    /// the same date
    #[test]
    fn legacy_rows_sort_first_within_a_date() {
        let timestamped = purchase(Location::AddisAbaba, date(0), 5, 10);
        let mut legacy = movement(
            Location::AddisAbaba,
            TransactionType::Purchase,
            date(0),
            None,
        );
        legacy.purchase_kg = dec(3);

        let movements = vec![timestamped.clone(), legacy.clone()];
        let entries = ledger::entries_affecting(&movements, Location::AddisAbaba);
        let order: Vec<Uuid> = entries.iter().map(|e| e.movement.id).collect();
        assert_eq!(order, vec![legacy.id, timestamped.id]);
    }

    /// Balances never go negative, however large the subtraction
    #[test]
    fn oversell_floors_at_zero() {
        let movements = vec![
            purchase(Location::AddisAbaba, date(0), 0, 10),
            sale(Location::AddisAbaba, date(1), 1, 10_000),
            purchase(Location::AddisAbaba, date(2), 2, 5),
        ];
        assert_eq!(
            final_balances(&movements, Location::AddisAbaba),
            vec![dec(10), dec(0), dec(5)]
        );
    }

    /// A transfer of Q from A to B moves exactly Q (away from the floor)
    #[test]
    fn transfer_conserves_stock() {
        let movements = vec![
            purchase(Location::SezKenya, date(0), 0, 50),
            purchase(Location::AddisAbaba, date(0), 1, 10),
            transfer(Location::SezKenya, Location::AddisAbaba, date(1), 2, 20),
        ];

        assert_eq!(
            ledger::location_total(&movements, Location::SezKenya),
            dec(30)
        );
        assert_eq!(
            ledger::location_total(&movements, Location::AddisAbaba),
            dec(30)
        );
    }

    /// The transfer quantity is debited at the origin whichever location
    /// originates it
    #[test]
    fn transfer_origin_is_not_location_specific() {
        let movements = vec![
            purchase(Location::AddisAbaba, date(0), 0, 80),
            transfer(Location::AddisAbaba, Location::SezKenya, date(1), 1, 30),
        ];

        assert_eq!(
            ledger::location_total(&movements, Location::AddisAbaba),
            dec(50)
        );
        assert_eq!(
            ledger::location_total(&movements, Location::SezKenya),
            dec(30)
        );
    }

    /// Nairobi Partner reports the latest snapshot, not a running sum
    #[test]
    fn snapshot_overrides_earlier_history() {
        let movements = vec![
            transfer(Location::SezKenya, Location::NairobiPartner, date(0), 0, 500),
            snapshot(date(3), 1, 80),
            snapshot(date(7), 2, 55),
        ];

        assert_eq!(
            ledger::location_total(&movements, Location::NairobiPartner),
            dec(55)
        );
    }

    /// A newer snapshot wins by date; creation time breaks date ties
    #[test]
    fn latest_snapshot_picked_by_date_then_created_at() {
        let movements = vec![snapshot(date(5), 0, 40), snapshot(date(5), 1, 70)];
        assert_eq!(
            ledger::location_total(&movements, Location::NairobiPartner),
            dec(70)
        );
    }

    /// Without any snapshot the location falls back to the replayed total
    #[test]
    fn nairobi_without_snapshot_uses_replay() {
        let movements = vec![transfer(
            Location::SezKenya,
            Location::NairobiPartner,
            date(0),
            0,
            25,
        )];
        assert_eq!(
            ledger::location_total(&movements, Location::NairobiPartner),
            dec(25)
        );
    }

    /// Recalculating after a removal is just a replay without the row
    #[test]
    fn removal_recalculates_the_remaining_chain() {
        let m1 = purchase(Location::AddisAbaba, date(0), 0, 100);
        let m2 = sale(Location::AddisAbaba, date(1), 1, 30);
        let m3 = sale(Location::AddisAbaba, date(2), 2, 20);

        let all = vec![m1.clone(), m2.clone(), m3.clone()];
        assert_eq!(
            final_balances(&all, Location::AddisAbaba),
            vec![dec(100), dec(70), dec(50)]
        );

        let without_m2: Vec<StockMovement> =
            all.into_iter().filter(|m| m.id != m2.id).collect();
        assert_eq!(
            final_balances(&without_m2, Location::AddisAbaba),
            vec![dec(100), dec(80)]
        );
    }

    /// Location/transaction-type exclusivity, both directions
    #[test]
    fn location_transaction_rules_enforced() {
        assert!(validate_location_transaction(
            Location::NairobiPartner,
            TransactionType::Purchase
        )
        .is_err());
        assert!(validate_location_transaction(
            Location::AddisAbaba,
            TransactionType::StockAvailability
        )
        .is_err());
        assert!(validate_location_transaction(
            Location::NairobiPartner,
            TransactionType::StockAvailability
        )
        .is_ok());
        assert!(validate_location_transaction(
            Location::SezKenya,
            TransactionType::InterCompanyTransfer
        )
        .is_ok());
    }

    /// Wire strings for the ledger enums match the stored values
    #[test]
    fn enum_wire_strings() {
        assert_eq!(
            serde_json::to_string(&TransactionType::InterCompanyTransfer).unwrap(),
            "\"Inter-company transfer\""
        );
        assert_eq!(
            serde_json::to_string(&TransactionType::StockAvailability).unwrap(),
            "\"Stock Availability\""
        );
        assert_eq!(
            serde_json::to_string(&Location::NairobiPartner).unwrap(),
            "\"nairobi_partner\""
        );
        assert_eq!(serde_json::to_string(&Unit::Kg).unwrap(), "\"kg\"");
    }

    /// The first entry keeps its stored beginning balance; later entries are
    /// rebased onto the carried balance
    #[test]
    fn beginning_balances_are_rewritten_after_the_first() {
        let mut m1 = purchase(Location::AddisAbaba, date(0), 0, 100);
        m1.beginning_balance = dec(40);
        let mut m2 = sale(Location::AddisAbaba, date(1), 1, 10);
        // A stale stored value that the replay must overwrite
        m2.beginning_balance = dec(7);

        let movements = vec![m1, m2];
        let entries = ledger::entries_affecting(&movements, Location::AddisAbaba);
        let balances = ledger::replay(&entries);

        assert_eq!(balances[0].beginning_balance, dec(40));
        assert_eq!(balances[0].balance_kg, dec(140));
        assert_eq!(balances[1].beginning_balance, dec(140));
        assert_eq!(balances[1].balance_kg, dec(130));
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    /// Quantities from 0 to 1000.0 kg
    fn quantity_strategy() -> impl Strategy<Value = Decimal> {
        (0i64..=10_000).prop_map(|n| Decimal::new(n, 1))
    }

    /// (day offset, purchase, sold) rows with distinct dates
    fn ledger_strategy() -> impl Strategy<Value = Vec<(i64, Decimal, Decimal)>> {
        proptest::collection::btree_set(0i64..365, 1..12).prop_flat_map(|days| {
            let days: Vec<i64> = days.into_iter().collect();
            let len = days.len();
            proptest::collection::vec((quantity_strategy(), quantity_strategy()), len).prop_map(
                move |quantities| {
                    days.iter()
                        .copied()
                        .zip(quantities)
                        .map(|(day, (purchase, sold))| (day, purchase, sold))
                        .collect()
                },
            )
        })
    }

    fn build_movements(rows: &[(i64, Decimal, Decimal)]) -> Vec<StockMovement> {
        rows.iter()
            .enumerate()
            .map(|(seq, (day, purchase_qty, sold_qty))| {
                let mut m = movement(
                    Location::AddisAbaba,
                    TransactionType::Purchase,
                    date(*day),
                    Some(seq as i64),
                );
                m.purchase_kg = *purchase_qty;
                m.sold_kg = *sold_qty;
                m
            })
            .collect()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Replay equals a reference sequential fold over date-sorted rows
        #[test]
        fn prop_replay_matches_reference(rows in ledger_strategy()) {
            let movements = build_movements(&rows);
            let balances = final_balances(&movements, Location::AddisAbaba);

            // Reference: walk rows sorted by date, flooring at each step
            let mut sorted = rows.clone();
            sorted.sort_by_key(|(day, _, _)| *day);
            let mut expected = Vec::new();
            let mut carry = Decimal::ZERO;
            for (_, purchase_qty, sold_qty) in &sorted {
                carry = (carry + purchase_qty - sold_qty).max(Decimal::ZERO);
                expected.push(carry);
            }

            prop_assert_eq!(balances, expected);
        }

        /// Insertion order never changes the outcome
        #[test]
        fn prop_order_independent(rows in ledger_strategy()) {
            let movements = build_movements(&rows);
            let mut reversed = movements.clone();
            reversed.reverse();

            prop_assert_eq!(
                final_balances(&movements, Location::AddisAbaba),
                final_balances(&reversed, Location::AddisAbaba)
            );
        }

        /// No computed balance is ever negative
        #[test]
        fn prop_balances_never_negative(rows in ledger_strategy()) {
            let movements = build_movements(&rows);
            for balance in final_balances(&movements, Location::AddisAbaba) {
                prop_assert!(balance >= Decimal::ZERO);
            }
        }

        /// Transfer conservation: A down by Q, B up by Q, when A can cover Q
        #[test]
        fn prop_transfer_conserves(
            initial_a in 1i64..=10_000,
            initial_b in 0i64..=10_000,
            transferred in 0i64..=10_000,
        ) {
            let transferred = transferred.min(initial_a);
            let movements = vec![
                purchase(Location::SezKenya, date(0), 0, initial_a),
                purchase(Location::AddisAbaba, date(0), 1, initial_b),
                transfer(Location::SezKenya, Location::AddisAbaba, date(1), 2, transferred),
            ];

            prop_assert_eq!(
                ledger::location_total(&movements, Location::SezKenya),
                dec(initial_a - transferred)
            );
            prop_assert_eq!(
                ledger::location_total(&movements, Location::AddisAbaba),
                dec(initial_b + transferred)
            );
        }

        /// The latest snapshot always wins for Nairobi Partner
        #[test]
        fn prop_latest_snapshot_wins(counts in proptest::collection::vec(0i64..=10_000, 1..8)) {
            let movements: Vec<StockMovement> = counts
                .iter()
                .enumerate()
                .map(|(i, count)| snapshot(date(i as i64), i as i64, *count))
                .collect();

            prop_assert_eq!(
                ledger::location_total(&movements, Location::NairobiPartner),
                dec(*counts.last().unwrap())
            );
        }
    }
}
