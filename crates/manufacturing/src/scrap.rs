//! Proportional raw-material waste for rejected production.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::RawItemId;

use crate::pending::PendingPart;
use crate::record::share_of;

/// Waste attributed to one raw material line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WasteAllocation {
    pub raw_item: RawItemId,
    pub raw_name: String,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub cost: Decimal,
}

/// Split `rejected` units of `pending` back onto its raw material bill.
///
/// Each line contributes `total_consumed * rejected / quantity_created`.
/// Lines that round to zero waste are omitted.
pub fn allocate_waste(pending: &PendingPart, rejected: Decimal) -> Vec<WasteAllocation> {
    let created = pending.quantity_created();
    if rejected <= Decimal::ZERO || created <= Decimal::ZERO {
        return Vec::new();
    }
    let rejected = rejected.min(created);

    pending
        .raw_materials()
        .iter()
        .filter_map(|line| {
            let quantity = share_of(line.total_consumed, rejected, created).normalize();
            if quantity.is_zero() {
                return None;
            }
            Some(WasteAllocation {
                raw_item: line.raw_item,
                raw_name: line.name.clone(),
                quantity,
                unit_cost: line.unit_cost,
                cost: quantity * line.unit_cost,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pending::RawMaterialConsumption;
    use chrono::Utc;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use stockledger_core::{PartId, PendingPartId};

    fn line(seq: u64, total: Decimal) -> RawMaterialConsumption {
        RawMaterialConsumption {
            raw_item: RawItemId::from_seq(seq),
            name: format!("raw {seq}"),
            quantity_per_unit: Decimal::ONE,
            total_consumed: total,
            unit_cost: dec!(2),
        }
    }

    fn pending(created: Decimal, lines: Vec<RawMaterialConsumption>) -> PendingPart {
        PendingPart::new(
            PendingPartId::from_seq(1),
            PartId::from_seq(1),
            "Bracket",
            None,
            created,
            lines,
            "operator",
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn twenty_percent_rejected_wastes_twenty_percent() {
        let part = pending(dec!(100), vec![line(1, dec!(50))]);
        let waste = allocate_waste(&part, dec!(20));
        assert_eq!(waste.len(), 1);
        assert_eq!(waste[0].quantity, dec!(10));
        assert_eq!(waste[0].cost, dec!(20));
    }

    #[test]
    fn full_rejection_wastes_every_line() {
        let part = pending(dec!(4), vec![line(1, dec!(8)), line(2, dec!(1.5))]);
        let waste = allocate_waste(&part, dec!(4));
        let quantities: Vec<_> = waste.iter().map(|w| w.quantity).collect();
        assert_eq!(quantities, vec![dec!(8), dec!(1.5)]);
    }

    #[test]
    fn nothing_rejected_means_no_waste() {
        let part = pending(dec!(4), vec![line(1, dec!(8))]);
        assert!(allocate_waste(&part, Decimal::ZERO).is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: waste never exceeds what was consumed, and full rejection wastes all of it.
        #[test]
        fn waste_is_bounded_by_consumption(created in 1u32..1_000, rejected_pct in 0u32..=100, total in 1u32..10_000) {
            let created = Decimal::from(created);
            let total = Decimal::from(total);
            let part = pending(created, vec![line(1, total)]);
            let rejected = created * Decimal::from(rejected_pct) / Decimal::from(100);

            let waste: Decimal = allocate_waste(&part, rejected).iter().map(|w| w.quantity).sum();
            prop_assert!(waste <= total);
            if rejected_pct == 100 {
                prop_assert_eq!(waste, total);
            }
        }
    }
}
