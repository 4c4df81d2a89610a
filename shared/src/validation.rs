//! Validation utilities for the ChemTrade CRM/PMS platform
//!
//! Pure business rules shared between the backend services and tests.

use rust_decimal::Decimal;

use crate::models::{Location, PipelineStage, TransactionType, Unit, BUSINESS_UNITS, INCOTERMS};

// ============================================================================
// Stock Validations
// ============================================================================

/// Validate that every quantity field is non-negative
pub fn validate_quantities(quantities: &[Decimal]) -> Result<(), &'static str> {
    if quantities.iter().any(|q| *q < Decimal::ZERO) {
        return Err("Quantity fields cannot be negative");
    }
    Ok(())
}

/// Enforce the location/transaction-type exclusivity rule: Nairobi Partner
/// records only snapshot entries, and snapshots exist nowhere else
pub fn validate_location_transaction(
    location: Location,
    transaction_type: TransactionType,
) -> Result<(), &'static str> {
    if location == Location::NairobiPartner
        && transaction_type != TransactionType::StockAvailability
    {
        return Err("Nairobi Partner location can only have 'Stock Availability' transaction type");
    }
    if location != Location::NairobiPartner
        && transaction_type == TransactionType::StockAvailability
    {
        return Err(
            "'Stock Availability' transaction type is only allowed for Nairobi Partner location",
        );
    }
    Ok(())
}

/// Validate product weight-per-unit
pub fn validate_kg_per_unit(kg_per_unit: Decimal) -> Result<(), &'static str> {
    if kg_per_unit <= Decimal::ZERO {
        return Err("kg_per_unit must be greater than zero");
    }
    Ok(())
}

// ============================================================================
// Sales Pipeline Validations
// ============================================================================

/// Validate the commercial details required from the Validation stage onwards
pub fn validate_pipeline_business_details(
    stage: PipelineStage,
    business_model: Option<&str>,
    unit: Option<Unit>,
    unit_price: Option<Decimal>,
) -> Result<(), &'static str> {
    if !stage.requires_business_details() {
        return Ok(());
    }
    if business_model.map_or(true, |m| m.trim().is_empty()) {
        return Err(
            "business_model is required for stages: Validation, Proposal, Confirmation, Closed",
        );
    }
    if unit.is_none() {
        return Err("unit is required for stages: Validation, Proposal, Confirmation, Closed");
    }
    match unit_price {
        None => {
            Err("unit_price is required for stages: Validation, Proposal, Confirmation, Closed")
        }
        Some(p) if p < Decimal::ZERO => Err("unit_price cannot be negative"),
        Some(_) => Ok(()),
    }
}

/// Validate deal amount when provided
pub fn validate_amount(amount: Option<Decimal>) -> Result<(), &'static str> {
    match amount {
        Some(a) if a < Decimal::ZERO => Err("amount cannot be negative"),
        _ => Ok(()),
    }
}

/// Validate a business unit tag against the fixed option list
pub fn validate_business_unit(business_unit: &str) -> Result<(), &'static str> {
    if BUSINESS_UNITS.contains(&business_unit) {
        Ok(())
    } else {
        Err("Business Unit must be one of: Hayat, Alhadi, Bet-chem, Barracoda, Nyumb-Chem")
    }
}

/// Validate an incoterm against the fixed option list
pub fn validate_incoterm(incoterm: &str) -> Result<(), &'static str> {
    if INCOTERMS.contains(&incoterm) {
        Ok(())
    } else {
        Err("Incoterm must be one of: Import of Record, Agency, Direct Import, Stock – Addis Ababa")
    }
}

// ============================================================================
// Customer Display IDs
// ============================================================================

/// Format a display id like `LC-2026-CUST-0042`
pub fn format_display_id(year: i32, sequence: u32) -> String {
    format!("LC-{}-CUST-{:04}", year, sequence)
}

/// Extract the sequence number from a display id issued in `year`
pub fn parse_display_id_sequence(display_id: &str, year: i32) -> Option<u32> {
    let prefix = format!("LC-{}-CUST-", year);
    display_id.strip_prefix(&prefix)?.parse().ok()
}

/// Next display id for `year`, given every display id already issued
pub fn next_display_id<'a>(year: i32, existing: impl Iterator<Item = &'a str>) -> String {
    let max_seq = existing
        .filter_map(|id| parse_display_id_sequence(id, year))
        .max()
        .unwrap_or(0);
    format_display_id(year, max_seq + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_quantity_rejected() {
        assert!(validate_quantities(&[Decimal::from(10), Decimal::from(-1)]).is_err());
        assert!(validate_quantities(&[Decimal::ZERO, Decimal::from(5)]).is_ok());
    }

    #[test]
    fn nairobi_partner_takes_only_snapshots() {
        assert!(validate_location_transaction(
            Location::NairobiPartner,
            TransactionType::StockAvailability
        )
        .is_ok());
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
        assert!(
            validate_location_transaction(Location::AddisAbaba, TransactionType::Sales).is_ok()
        );
    }

    #[test]
    fn business_details_required_from_validation_stage() {
        assert!(validate_pipeline_business_details(
            PipelineStage::Discovery,
            None,
            None,
            None
        )
        .is_ok());
        assert!(validate_pipeline_business_details(
            PipelineStage::Validation,
            None,
            Some(Unit::Kg),
            Some(Decimal::ONE)
        )
        .is_err());
        assert!(validate_pipeline_business_details(
            PipelineStage::Proposal,
            Some("Import"),
            None,
            Some(Decimal::ONE)
        )
        .is_err());
        assert!(validate_pipeline_business_details(
            PipelineStage::Closed,
            Some("Import"),
            Some(Unit::Ton),
            Some(Decimal::from(120))
        )
        .is_ok());
    }

    #[test]
    fn unit_price_cannot_be_negative() {
        assert!(validate_pipeline_business_details(
            PipelineStage::Confirmation,
            Some("Import"),
            Some(Unit::Kg),
            Some(Decimal::from(-3))
        )
        .is_err());
    }

    #[test]
    fn option_lists_enforced() {
        assert!(validate_business_unit("Hayat").is_ok());
        assert!(validate_business_unit("Unknown").is_err());
        assert!(validate_incoterm("Direct Import").is_ok());
        assert!(validate_incoterm("FOB").is_err());
    }

    #[test]
    fn display_id_round_trip() {
        let id = format_display_id(2026, 7);
        assert_eq!(id, "LC-2026-CUST-0007");
        assert_eq!(parse_display_id_sequence(&id, 2026), Some(7));
        assert_eq!(parse_display_id_sequence(&id, 2025), None);
        assert_eq!(parse_display_id_sequence("LC-2026-CUST-xyz", 2026), None);
    }

    #[test]
    fn next_display_id_continues_sequence() {
        let existing = ["LC-2026-CUST-0001", "LC-2026-CUST-0019", "LC-2025-CUST-0400"];
        assert_eq!(
            next_display_id(2026, existing.iter().copied()),
            "LC-2026-CUST-0020"
        );
        assert_eq!(
            next_display_id(2026, std::iter::empty()),
            "LC-2026-CUST-0001"
        );
    }
}
