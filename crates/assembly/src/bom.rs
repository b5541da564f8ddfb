//! Bill-of-materials resolution.
//!
//! Pure functions over an assembly's BOM. Stock levels come from a caller
//! supplied lookup so the same check runs against a live unit of work or a
//! plain map in tests.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{AssemblyId, DomainError, DomainResult, ItemRef, Shortage};

use crate::assembly::{Assembly, BomItem};

/// Component demand for a given build quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    pub component: ItemRef,
    pub per_unit: Decimal,
    pub required: Decimal,
}

/// Outcome of a buildability check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Buildability {
    pub assembly: AssemblyId,
    pub quantity: u64,
    pub feasible: bool,
    pub requirements: Vec<Requirement>,
    /// Every component that cannot cover its requirement, in BOM order.
    pub shortages: Vec<Shortage>,
}

impl Buildability {
    /// Turn an infeasible result into `CannotBuild`.
    pub fn ensure_feasible(self) -> DomainResult<Self> {
        if self.feasible {
            return Ok(self);
        }
        Err(DomainError::CannotBuild {
            assembly: self.assembly.to_string(),
            quantity: self.quantity,
            shortages: self.shortages,
        })
    }
}

/// Fails with `Validation` when a requirement does not fit in a `Decimal`.
pub fn requirements(bom: &[BomItem], quantity: u64) -> DomainResult<Vec<Requirement>> {
    let units = Decimal::from(quantity);
    bom.iter()
        .map(|b| {
            let required = b.quantity_required.checked_mul(units).ok_or_else(|| {
                DomainError::validation(format!(
                    "{quantity} units of {} needs more than can be represented",
                    b.component
                ))
            })?;
            Ok(Requirement {
                component: b.component,
                per_unit: b.quantity_required,
                required,
            })
        })
        .collect()
}

/// Check whether `quantity` units of `assembly` can be built from current stock.
///
/// Reports all shortages, not just the first one.
pub fn can_build<F>(
    assembly: &Assembly,
    quantity: u64,
    mut on_hand: F,
) -> DomainResult<Buildability>
where
    F: FnMut(ItemRef) -> DomainResult<Decimal>,
{
    if quantity == 0 {
        return Err(DomainError::validation("build quantity must be positive"));
    }
    if assembly.bom().is_empty() {
        return Err(DomainError::validation(format!(
            "{} has an empty bill of materials",
            assembly.id_typed()
        )));
    }

    let requirements = requirements(assembly.bom(), quantity)?;
    let mut shortages = Vec::new();
    for req in &requirements {
        let available = on_hand(req.component)?;
        if available < req.required {
            shortages.push(Shortage {
                item: req.component,
                required: req.required,
                available,
            });
        }
    }

    Ok(Buildability {
        assembly: assembly.id_typed(),
        quantity,
        feasible: shortages.is_empty(),
        requirements,
        shortages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::AssemblyCommand;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use stockledger_core::{Aggregate, PartId, RawItemId};

    fn x() -> ItemRef {
        ItemRef::Part(PartId::from_seq(1))
    }

    fn y() -> ItemRef {
        ItemRef::RawItem(RawItemId::from_seq(1))
    }

    fn test_assembly() -> Assembly {
        let mut a = Assembly::new(AssemblyId::from_seq(1), "Widget", None).unwrap();
        a.execute(&AssemblyCommand::AddComponent {
            component: x(),
            quantity_required: dec!(2),
        })
        .unwrap();
        a.execute(&AssemblyCommand::AddComponent {
            component: y(),
            quantity_required: dec!(1),
        })
        .unwrap();
        a
    }

    fn stock() -> HashMap<ItemRef, Decimal> {
        [(x(), dec!(10)), (y(), dec!(3))].into_iter().collect()
    }

    fn lookup(
        stock: &HashMap<ItemRef, Decimal>,
    ) -> impl FnMut(ItemRef) -> DomainResult<Decimal> + '_ {
        |item| Ok(stock.get(&item).copied().unwrap_or(Decimal::ZERO))
    }

    #[test]
    fn three_units_are_buildable() {
        let stock = stock();
        let result = can_build(&test_assembly(), 3, lookup(&stock)).unwrap();
        assert!(result.feasible);
        assert!(result.shortages.is_empty());
        assert_eq!(result.requirements[0].required, dec!(6));
        assert_eq!(result.requirements[1].required, dec!(3));
    }

    #[test]
    fn four_units_are_short_on_y() {
        let stock = stock();
        let result = can_build(&test_assembly(), 4, lookup(&stock)).unwrap();
        assert!(!result.feasible);
        assert_eq!(
            result.shortages,
            vec![Shortage {
                item: y(),
                required: dec!(4),
                available: dec!(3),
            }]
        );

        let err = result.ensure_feasible().unwrap_err();
        assert_eq!(err.shortages().len(), 1);
    }

    #[test]
    fn every_short_component_is_reported() {
        let stock = stock();
        let result = can_build(&test_assembly(), 6, lookup(&stock)).unwrap();
        let short: Vec<_> = result.shortages.iter().map(|s| s.item).collect();
        assert_eq!(short, vec![x(), y()]);
    }

    #[test]
    fn empty_bom_is_a_validation_error() {
        let empty = Assembly::new(AssemblyId::from_seq(2), "Empty", None).unwrap();
        let stock = stock();
        let err = can_build(&empty, 1, lookup(&stock)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn oversized_requirements_are_rejected_not_panicking() {
        let mut huge = Assembly::new(AssemblyId::from_seq(3), "Huge", None).unwrap();
        huge.execute(&AssemblyCommand::AddComponent {
            component: x(),
            quantity_required: dec!(100000000000),
        })
        .unwrap();
        let stock = stock();

        let err = can_build(&huge, u64::MAX, lookup(&stock)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert!(requirements(huge.bom(), u64::MAX).is_err());
        assert_eq!(requirements(huge.bom(), 2).unwrap()[0].required, dec!(200000000000));
    }

    #[test]
    fn lookup_errors_propagate() {
        let err = can_build(&test_assembly(), 1, |item| {
            Err(DomainError::not_found("item", item))
        })
        .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: feasible exactly when every component covers qty * per-unit.
        #[test]
        fn feasibility_matches_stock(x_on_hand in 0u32..100, y_on_hand in 0u32..100, qty in 1u64..60) {
            let stock: HashMap<ItemRef, Decimal> =
                [(x(), Decimal::from(x_on_hand)), (y(), Decimal::from(y_on_hand))]
                    .into_iter()
                    .collect();
            let result = can_build(&test_assembly(), qty, lookup(&stock)).unwrap();
            let expected = u64::from(x_on_hand) >= 2 * qty && u64::from(y_on_hand) >= qty;
            prop_assert_eq!(result.feasible, expected);
            prop_assert_eq!(result.feasible, result.shortages.is_empty());
        }
    }
}
