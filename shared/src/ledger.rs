//! Running-balance replay engine for the stock ledger
//!
//! Every movement's ending balance is a pure function of the full movement
//! history of its product: the entries affecting a location are ordered by
//! (date, creation time) and walked with a carried balance. The functions
//! here do no I/O; the stock service feeds them rows and persists the
//! results.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::{Location, StockMovement, TransactionType};

/// How a movement participates in a location's ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Recorded at the location itself
    Direct,
    /// Inter-company transfer recorded elsewhere, destined for the location
    InboundTransfer,
}

/// A movement paired with its role in one location's ledger
#[derive(Debug, Clone, Copy)]
pub struct LedgerEntry<'a> {
    pub kind: EntryKind,
    pub movement: &'a StockMovement,
}

/// Recomputed balances for one ledger entry, ready to persist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecalculatedBalance {
    pub id: Uuid,
    pub beginning_balance: Decimal,
    pub balance_kg: Decimal,
}

/// Deterministic ledger order: by date, then creation time. Entries without
/// a creation timestamp sort earliest within their date.
fn order_key(m: &StockMovement) -> (NaiveDate, DateTime<Utc>) {
    (m.date, m.created_at.unwrap_or(DateTime::<Utc>::MIN_UTC))
}

/// Select and order the entries that affect `location`: movements recorded
/// there, plus inter-company transfers recorded elsewhere whose destination
/// names it.
pub fn entries_affecting(movements: &[StockMovement], location: Location) -> Vec<LedgerEntry<'_>> {
    let mut entries: Vec<LedgerEntry> = movements
        .iter()
        .filter_map(|m| {
            if m.location == location {
                Some(LedgerEntry {
                    kind: EntryKind::Direct,
                    movement: m,
                })
            } else if m.transaction_type == TransactionType::InterCompanyTransfer
                && m.transfer_to_location == Some(location)
            {
                Some(LedgerEntry {
                    kind: EntryKind::InboundTransfer,
                    movement: m,
                })
            } else {
                None
            }
        })
        .collect();

    entries.sort_by_key(|e| order_key(e.movement));
    entries
}

fn is_snapshot(entry: &LedgerEntry) -> bool {
    entry.kind == EntryKind::Direct
        && entry.movement.transaction_type == TransactionType::StockAvailability
}

/// Ending balance of one entry given the balance it starts from
fn ending_balance(entry: &LedgerEntry, start: Decimal) -> Decimal {
    let m = entry.movement;
    let ending = match entry.kind {
        EntryKind::InboundTransfer => start + m.inter_company_transfer_kg,
        EntryKind::Direct => match m.transaction_type {
            // Snapshot entries carry an operator-entered absolute count
            TransactionType::StockAvailability => m.beginning_balance,
            // The transfer quantity is applied only at the origin
            TransactionType::InterCompanyTransfer => start - m.inter_company_transfer_kg,
            _ => {
                start + m.purchase_kg + m.purchase_direct_shipment_kg
                    - m.sold_kg
                    - m.sold_direct_shipment_kg
                    - m.sample_or_damage_kg
            }
        },
    };
    ending.max(Decimal::ZERO)
}

/// Walk an ordered ledger, carrying the running balance forward.
///
/// The first entry starts from its own stored beginning balance; every later
/// entry starts from the previous entry's computed ending balance. Snapshot
/// (`Stock Availability`) entries are fixed points: their stored count is
/// preserved as both beginning and ending balance.
pub fn replay(entries: &[LedgerEntry]) -> Vec<RecalculatedBalance> {
    let mut out = Vec::with_capacity(entries.len());
    let mut carry: Option<Decimal> = None;

    for entry in entries {
        let m = entry.movement;
        let beginning = if is_snapshot(entry) {
            m.beginning_balance
        } else {
            carry.unwrap_or(m.beginning_balance)
        };
        let ending = ending_balance(entry, beginning);
        out.push(RecalculatedBalance {
            id: m.id,
            beginning_balance: beginning,
            balance_kg: ending,
        });
        carry = Some(ending);
    }

    out
}

/// Final replayed balance for a location; zero when nothing affects it
pub fn replayed_total(movements: &[StockMovement], location: Location) -> Decimal {
    let entries = entries_affecting(movements, location);
    replay(&entries)
        .last()
        .map(|r| r.balance_kg)
        .unwrap_or(Decimal::ZERO)
}

/// Most recent Stock Availability entry at a location, by (date, creation time)
pub fn latest_snapshot(movements: &[StockMovement], location: Location) -> Option<&StockMovement> {
    movements
        .iter()
        .filter(|m| {
            m.location == location && m.transaction_type == TransactionType::StockAvailability
        })
        .max_by_key(|m| order_key(m))
}

/// Current stock at a location.
///
/// Nairobi Partner reports the latest snapshot's balance (its ledger is made
/// of snapshot entries, not accumulations); the other locations report the
/// replayed running balance. Falls back to the replayed total when no
/// snapshot exists.
pub fn location_total(movements: &[StockMovement], location: Location) -> Decimal {
    if location == Location::NairobiPartner {
        if let Some(snapshot) = latest_snapshot(movements, location) {
            return snapshot.balance_kg.max(Decimal::ZERO);
        }
    }
    replayed_total(movements, location)
}

/// Running balance a new entry dated `date` and created now would start
/// from: the replayed balance of every existing entry that sorts before it.
/// Existing rows were created in the past, so all entries up to and
/// including `date` qualify.
pub fn balance_before(movements: &[StockMovement], location: Location, date: NaiveDate) -> Decimal {
    let prior: Vec<LedgerEntry> = entries_affecting(movements, location)
        .into_iter()
        .filter(|e| e.movement.date <= date)
        .collect();
    replay(&prior)
        .last()
        .map(|r| r.balance_kg)
        .unwrap_or(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Unit;
    use chrono::TimeZone;

    fn dec(n: i64) -> Decimal {
        Decimal::from(n)
    }

    fn movement(
        location: Location,
        transaction_type: TransactionType,
        date: NaiveDate,
        created_minute: Option<u32>,
    ) -> StockMovement {
        StockMovement {
            id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
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
            created_at: created_minute
                .map(|min| Utc.with_ymd_and_hms(2024, 6, 1, 12, min, 0).unwrap()),
            updated_at: None,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn replay_chains_purchases_and_sales() {
        let mut m1 = movement(
            Location::AddisAbaba,
            TransactionType::Purchase,
            date(2024, 1, 1),
            Some(0),
        );
        m1.purchase_kg = dec(100);
        let mut m2 = movement(
            Location::AddisAbaba,
            TransactionType::Sales,
            date(2024, 1, 2),
            Some(1),
        );
        m2.sold_kg = dec(30);

        let movements = vec![m1, m2];
        let entries = entries_affecting(&movements, Location::AddisAbaba);
        let balances = replay(&entries);

        assert_eq!(balances[0].balance_kg, dec(100));
        assert_eq!(balances[1].beginning_balance, dec(100));
        assert_eq!(balances[1].balance_kg, dec(70));
    }

    #[test]
    fn oversell_floors_at_zero() {
        let mut m1 = movement(
            Location::AddisAbaba,
            TransactionType::Purchase,
            date(2024, 1, 1),
            Some(0),
        );
        m1.purchase_kg = dec(10);
        let mut m2 = movement(
            Location::AddisAbaba,
            TransactionType::Sales,
            date(2024, 1, 2),
            Some(1),
        );
        m2.sold_kg = dec(500);

        let movements = vec![m1, m2];
        let entries = entries_affecting(&movements, Location::AddisAbaba);
        let balances = replay(&entries);

        assert_eq!(balances[1].balance_kg, Decimal::ZERO);
    }

    #[test]
    fn inbound_transfer_credits_destination() {
        let mut origin = movement(
            Location::SezKenya,
            TransactionType::InterCompanyTransfer,
            date(2024, 2, 1),
            Some(0),
        );
        origin.beginning_balance = dec(50);
        origin.inter_company_transfer_kg = dec(20);
        origin.transfer_to_location = Some(Location::AddisAbaba);

        let movements = vec![origin];

        let sez = entries_affecting(&movements, Location::SezKenya);
        assert_eq!(replay(&sez)[0].balance_kg, dec(30));

        let addis = entries_affecting(&movements, Location::AddisAbaba);
        assert_eq!(addis.len(), 1);
        assert_eq!(addis[0].kind, EntryKind::InboundTransfer);
        assert_eq!(replay(&addis)[0].balance_kg, dec(20));
    }

    #[test]
    fn snapshots_are_fixed_points() {
        let mut s1 = movement(
            Location::NairobiPartner,
            TransactionType::StockAvailability,
            date(2024, 3, 1),
            Some(0),
        );
        s1.beginning_balance = dec(80);
        s1.balance_kg = dec(80);
        let mut s2 = movement(
            Location::NairobiPartner,
            TransactionType::StockAvailability,
            date(2024, 3, 5),
            Some(1),
        );
        s2.beginning_balance = dec(55);
        s2.balance_kg = dec(55);

        let movements = vec![s1, s2];
        let entries = entries_affecting(&movements, Location::NairobiPartner);
        let balances = replay(&entries);

        assert_eq!(balances[0].balance_kg, dec(80));
        assert_eq!(balances[1].balance_kg, dec(55));
        assert_eq!(
            location_total(&movements, Location::NairobiPartner),
            dec(55)
        );
    }

    #[test]
    fn missing_created_at_sorts_first() {
        let mut late = movement(
            Location::AddisAbaba,
            TransactionType::Purchase,
            date(2024, 4, 1),
            Some(30),
        );
        late.purchase_kg = dec(5);
        let mut untimed = movement(
            Location::AddisAbaba,
            TransactionType::Purchase,
            date(2024, 4, 1),
            None,
        );
        untimed.purchase_kg = dec(7);

        let movements = vec![late.clone(), untimed.clone()];
        let entries = entries_affecting(&movements, Location::AddisAbaba);
        assert_eq!(entries[0].movement.id, untimed.id);
        assert_eq!(entries[1].movement.id, late.id);
    }

    #[test]
    fn balance_before_includes_same_date_entries() {
        let mut m1 = movement(
            Location::AddisAbaba,
            TransactionType::Purchase,
            date(2024, 5, 1),
            Some(0),
        );
        m1.purchase_kg = dec(40);
        let mut m2 = movement(
            Location::AddisAbaba,
            TransactionType::Purchase,
            date(2024, 5, 3),
            Some(1),
        );
        m2.purchase_kg = dec(10);

        let movements = vec![m1, m2];
        assert_eq!(
            balance_before(&movements, Location::AddisAbaba, date(2024, 5, 1)),
            dec(40)
        );
        assert_eq!(
            balance_before(&movements, Location::AddisAbaba, date(2024, 5, 10)),
            dec(50)
        );
    }
}
