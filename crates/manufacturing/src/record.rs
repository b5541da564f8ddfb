use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, ManufacturingRecordId, PartId, PendingPartId};

use crate::pending::{PendingPart, PendingPartStatus, RawMaterialConsumption};

/// Write-once summary of accepted production.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManufacturingRecord {
    pub id: ManufacturingRecordId,
    pub pending_part: PendingPartId,
    pub part: PartId,
    pub part_name: String,
    pub part_type: Option<String>,
    pub quantity_produced: Decimal,
    pub raw_materials: Vec<RawMaterialConsumption>,
    /// Share of the run's raw cost attributable to the accepted units.
    pub total_cost: Decimal,
    pub cost_per_unit: Decimal,
    pub produced_by: String,
    pub produced_at: DateTime<Utc>,
    pub inspector: String,
    pub accepted_at: DateTime<Utc>,
}

impl ManufacturingRecord {
    pub fn from_acceptance(
        id: ManufacturingRecordId,
        pending: &PendingPart,
    ) -> Result<Self, DomainError> {
        let qc = match (pending.status(), pending.quality_control()) {
            (PendingPartStatus::Accepted, Some(qc)) => qc,
            _ => {
                return Err(DomainError::invariant(format!(
                    "{} has not been accepted",
                    pending.id_typed()
                )));
            }
        };
        if qc.passed_quantity <= Decimal::ZERO {
            return Err(DomainError::invariant(format!(
                "{} has no accepted units to record",
                pending.id_typed()
            )));
        }

        let total_cost = share_of(
            pending.total_raw_cost(),
            qc.passed_quantity,
            pending.quantity_created(),
        );
        let cost_per_unit = total_cost.checked_div(qc.passed_quantity).ok_or_else(|| {
            DomainError::validation(format!(
                "cost per unit of {} is too large to represent",
                pending.id_typed()
            ))
        })?;
        Ok(Self {
            id,
            pending_part: pending.id_typed(),
            part: pending.part(),
            part_name: pending.part_name().to_owned(),
            part_type: pending.part_type().map(str::to_owned),
            quantity_produced: qc.passed_quantity,
            raw_materials: pending.raw_materials().to_vec(),
            total_cost,
            cost_per_unit,
            produced_by: pending.created_by().to_owned(),
            produced_at: pending.created_at(),
            inspector: qc.inspector.clone(),
            accepted_at: qc.reviewed_at,
        })
    }
}

/// `amount * part / whole`, exact when the product fits.
///
/// `part <= whole`, so the ratio form cannot overflow.
pub(crate) fn share_of(amount: Decimal, part: Decimal, whole: Decimal) -> Decimal {
    amount
        .checked_mul(part)
        .and_then(|v| v.checked_div(whole))
        .unwrap_or_else(|| amount * (part / whole))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pending::{PendingPartCommand, ReviewAction};
    use rust_decimal_macros::dec;
    use stockledger_core::{Aggregate, RawItemId};

    fn test_pending() -> PendingPart {
        PendingPart::new(
            PendingPartId::from_seq(3),
            PartId::from_seq(9),
            "Bracket",
            None,
            dec!(100),
            vec![RawMaterialConsumption {
                raw_item: RawItemId::from_seq(1),
                name: "Aluminium".to_string(),
                quantity_per_unit: dec!(0.5),
                total_consumed: dec!(50),
                unit_cost: dec!(4),
            }],
            "operator",
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn cost_is_proportional_to_accepted_units() {
        let mut pending = test_pending();
        pending
            .execute(&PendingPartCommand::Review {
                action: ReviewAction::Accept {
                    passed: dec!(80),
                    rejected: dec!(20),
                },
                reason: None,
                inspector: "qa".to_string(),
                reviewed_at: Utc::now(),
            })
            .unwrap();

        let record =
            ManufacturingRecord::from_acceptance(ManufacturingRecordId::from_seq(1), &pending)
                .unwrap();
        assert_eq!(record.quantity_produced, dec!(80));
        assert_eq!(record.total_cost, dec!(160));
        assert_eq!(record.cost_per_unit, dec!(2));
        assert_eq!(record.id.to_string(), "MR000001");
    }

    #[test]
    fn unreviewed_parts_have_no_record() {
        let err = ManufacturingRecord::from_acceptance(
            ManufacturingRecordId::from_seq(1),
            &test_pending(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }
}
