use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{
    Aggregate, AggregateRoot, DomainError, ItemKind, ItemRef, PendingPartId, RawItemId,
};

/// Where a batch of scrap came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapProvenance {
    pub pending_part: PendingPartId,
    pub quantity: Decimal,
    pub reason: Option<String>,
    pub inspector: String,
    pub recorded_at: DateTime<Utc>,
}

/// Kind-specific attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StockDetails {
    Part {
        part_type: Option<String>,
    },
    RawItem {
        unit_of_measure: Option<String>,
    },
    Scrap {
        source_raw_item: RawItemId,
        provenance: Vec<ScrapProvenance>,
    },
}

impl StockDetails {
    pub fn kind(&self) -> ItemKind {
        match self {
            StockDetails::Part { .. } => ItemKind::Part,
            StockDetails::RawItem { .. } => ItemKind::RawItem,
            StockDetails::Scrap { .. } => ItemKind::ScrapItem,
        }
    }
}

/// Aggregate root: StockItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockItem {
    id: ItemRef,
    name: String,
    quantity_on_hand: Decimal,
    min_stock_level: Decimal,
    cost_per_unit: Decimal,
    last_restocked: Option<DateTime<Utc>>,
    details: StockDetails,
    version: u64,
}

impl StockItem {
    /// Create a new item with nothing on hand.
    pub fn new(
        id: ItemRef,
        name: impl Into<String>,
        cost_per_unit: Decimal,
        min_stock_level: Decimal,
        details: StockDetails,
    ) -> Result<Self, DomainError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if cost_per_unit < Decimal::ZERO {
            return Err(DomainError::validation("cost per unit cannot be negative"));
        }
        if min_stock_level < Decimal::ZERO {
            return Err(DomainError::validation("minimum stock level cannot be negative"));
        }
        if details.kind() != id.kind() {
            return Err(DomainError::validation(format!(
                "{id} is a {} but details describe a {}",
                id.kind().as_str(),
                details.kind().as_str()
            )));
        }
        Ok(Self {
            id,
            name,
            quantity_on_hand: Decimal::ZERO,
            min_stock_level,
            cost_per_unit,
            last_restocked: None,
            details,
            version: 0,
        })
    }

    pub fn scrap_of(
        id: stockledger_core::ScrapItemId,
        raw_item: RawItemId,
        raw_name: &str,
        cost_per_unit: Decimal,
    ) -> Result<Self, DomainError> {
        Self::new(
            ItemRef::Scrap(id),
            format!("Scrap: {raw_name}"),
            cost_per_unit,
            Decimal::ZERO,
            StockDetails::Scrap {
                source_raw_item: raw_item,
                provenance: Vec::new(),
            },
        )
    }

    pub fn item_ref(&self) -> ItemRef {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn quantity_on_hand(&self) -> Decimal {
        self.quantity_on_hand
    }

    pub fn min_stock_level(&self) -> Decimal {
        self.min_stock_level
    }

    pub fn cost_per_unit(&self) -> Decimal {
        self.cost_per_unit
    }

    pub fn last_restocked(&self) -> Option<DateTime<Utc>> {
        self.last_restocked
    }

    pub fn details(&self) -> &StockDetails {
        &self.details
    }

    pub fn is_below_min(&self) -> bool {
        self.quantity_on_hand < self.min_stock_level
    }

    pub fn scrap_provenance(&self) -> &[ScrapProvenance] {
        match &self.details {
            StockDetails::Scrap { provenance, .. } => provenance,
            _ => &[],
        }
    }
}

impl AggregateRoot for StockItem {
    type Id = ItemRef;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockCommand {
    /// Goods arrived from a supplier or a production run; stamps `last_restocked`.
    Receive {
        quantity: Decimal,
        restocked_at: DateTime<Utc>,
    },
    Withdraw {
        quantity: Decimal,
    },
    /// Put previously consumed stock back (e.g. dismantling an assembly).
    Restore {
        quantity: Decimal,
    },
    SetQuantity {
        quantity: Decimal,
    },
    AccumulateScrap(ScrapProvenance),
}

/// Event: QuantityChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantityChanged {
    pub item: ItemRef,
    pub previous: Decimal,
    pub new: Decimal,
    pub restocked_at: Option<DateTime<Utc>>,
}

impl QuantityChanged {
    pub fn delta(&self) -> Decimal {
        self.new - self.previous
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockEvent {
    QuantityChanged(QuantityChanged),
    ScrapRecorded(ScrapProvenance),
}

impl StockEvent {
    /// The quantity change among `events`, if any.
    pub fn quantity_change(events: &[StockEvent]) -> Option<&QuantityChanged> {
        events.iter().find_map(|e| match e {
            StockEvent::QuantityChanged(change) => Some(change),
            StockEvent::ScrapRecorded(_) => None,
        })
    }
}

impl Aggregate for StockItem {
    type Command = StockCommand;
    type Event = StockEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            StockEvent::QuantityChanged(e) => {
                self.quantity_on_hand = e.new;
                if let Some(at) = e.restocked_at {
                    self.last_restocked = Some(at);
                }
            }
            StockEvent::ScrapRecorded(p) => {
                if let StockDetails::Scrap { provenance, .. } = &mut self.details {
                    provenance.push(p.clone());
                }
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            StockCommand::Receive {
                quantity,
                restocked_at,
            } => Ok(vec![self.increase(*quantity, Some(*restocked_at))?]),
            StockCommand::Restore { quantity } => Ok(vec![self.increase(*quantity, None)?]),
            StockCommand::Withdraw { quantity } => Ok(vec![self.decrease(*quantity)?]),
            StockCommand::SetQuantity { quantity } => Ok(vec![self.set_quantity(*quantity)?]),
            StockCommand::AccumulateScrap(provenance) => self.handle_scrap(provenance),
        }
    }
}

impl StockItem {
    fn ensure_positive(quantity: Decimal) -> Result<(), DomainError> {
        if quantity <= Decimal::ZERO {
            return Err(DomainError::validation("quantity must be positive"));
        }
        Ok(())
    }

    fn change(&self, new: Decimal, restocked_at: Option<DateTime<Utc>>) -> StockEvent {
        StockEvent::QuantityChanged(QuantityChanged {
            item: self.id,
            previous: self.quantity_on_hand,
            new,
            restocked_at,
        })
    }

    fn increase(
        &self,
        quantity: Decimal,
        restocked_at: Option<DateTime<Utc>>,
    ) -> Result<StockEvent, DomainError> {
        Self::ensure_positive(quantity)?;
        let new = self.quantity_on_hand.checked_add(quantity).ok_or_else(|| {
            DomainError::validation(format!("{} would hold more than can be represented", self.id))
        })?;
        Ok(self.change(new, restocked_at))
    }

    fn decrease(&self, quantity: Decimal) -> Result<StockEvent, DomainError> {
        Self::ensure_positive(quantity)?;
        if quantity > self.quantity_on_hand {
            return Err(DomainError::InsufficientStock {
                subject: self.id.to_string(),
                requested: quantity,
                available: self.quantity_on_hand,
            });
        }
        Ok(self.change(self.quantity_on_hand - quantity, None))
    }

    fn set_quantity(&self, quantity: Decimal) -> Result<StockEvent, DomainError> {
        if quantity < Decimal::ZERO {
            return Err(DomainError::validation("quantity on hand cannot be negative"));
        }
        if quantity == self.quantity_on_hand {
            return Err(DomainError::validation("adjustment does not change the quantity"));
        }
        Ok(self.change(quantity, None))
    }

    fn handle_scrap(&self, provenance: &ScrapProvenance) -> Result<Vec<StockEvent>, DomainError> {
        if !matches!(self.details, StockDetails::Scrap { .. }) {
            return Err(DomainError::invariant(format!(
                "{} is not a scrap item",
                self.id
            )));
        }
        Ok(vec![
            self.increase(provenance.quantity, None)?,
            StockEvent::ScrapRecorded(provenance.clone()),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use stockledger_core::{PartId, ScrapItemId};

    fn test_part() -> StockItem {
        StockItem::new(
            ItemRef::Part(PartId::from_seq(1)),
            "Bracket",
            dec!(1.25),
            dec!(5),
            StockDetails::Part { part_type: None },
        )
        .unwrap()
    }

    #[test]
    fn receive_raises_stock_and_stamps_restock_time() {
        let mut item = test_part();
        let now = Utc::now();
        let events = item
            .execute(&StockCommand::Receive {
                quantity: dec!(12),
                restocked_at: now,
            })
            .unwrap();
        let change = StockEvent::quantity_change(&events).unwrap();
        assert_eq!(change.previous, dec!(0));
        assert_eq!(change.new, dec!(12));
        assert_eq!(item.quantity_on_hand(), dec!(12));
        assert_eq!(item.last_restocked(), Some(now));
        assert!(!item.is_below_min());
        assert_eq!(item.version(), 1);
    }

    #[test]
    fn increase_past_the_decimal_range_is_rejected() {
        let mut item = test_part();
        item.execute(&StockCommand::SetQuantity {
            quantity: Decimal::MAX,
        })
        .unwrap();
        let err = item
            .handle(&StockCommand::Restore { quantity: dec!(1) })
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(item.quantity_on_hand(), Decimal::MAX);
    }

    #[test]
    fn withdraw_below_zero_fails_without_events() {
        let mut item = test_part();
        item.execute(&StockCommand::Restore { quantity: dec!(3) })
            .unwrap();
        let err = item
            .handle(&StockCommand::Withdraw { quantity: dec!(4) })
            .unwrap_err();
        assert_eq!(
            err,
            DomainError::InsufficientStock {
                subject: "P000001".to_string(),
                requested: dec!(4),
                available: dec!(3),
            }
        );
        assert_eq!(item.quantity_on_hand(), dec!(3));
        assert!(item.is_below_min());
    }

    #[test]
    fn kind_must_match_details() {
        let err = StockItem::new(
            ItemRef::Part(PartId::from_seq(1)),
            "Steel bar",
            dec!(1),
            dec!(0),
            StockDetails::RawItem {
                unit_of_measure: None,
            },
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn scrap_accumulates_with_provenance() {
        let mut scrap =
            StockItem::scrap_of(ScrapItemId::from_seq(1), RawItemId::from_seq(4), "Resin", dec!(2))
                .unwrap();
        let provenance = ScrapProvenance {
            pending_part: PendingPartId::from_seq(1),
            quantity: dec!(10),
            reason: Some("porosity".to_string()),
            inspector: "qc".to_string(),
            recorded_at: Utc::now(),
        };
        scrap
            .execute(&StockCommand::AccumulateScrap(provenance.clone()))
            .unwrap();
        scrap
            .execute(&StockCommand::AccumulateScrap(provenance))
            .unwrap();
        assert_eq!(scrap.quantity_on_hand(), dec!(20));
        assert_eq!(scrap.scrap_provenance().len(), 2);
        assert_eq!(scrap.name(), "Scrap: Resin");
    }

    #[test]
    fn scrap_cannot_accumulate_on_a_part() {
        let item = test_part();
        let err = item
            .handle(&StockCommand::AccumulateScrap(ScrapProvenance {
                pending_part: PendingPartId::from_seq(1),
                quantity: dec!(1),
                reason: None,
                inspector: "qc".to_string(),
                recorded_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    proptest! {
        /// Property: no sequence of withdrawals and restores leaves negative stock.
        #[test]
        fn stock_never_goes_negative(ops in prop::collection::vec((any::<bool>(), 1i64..50), 1..40)) {
            let mut item = test_part();
            for (withdraw, qty) in ops {
                let quantity = Decimal::from(qty);
                let cmd = if withdraw {
                    StockCommand::Withdraw { quantity }
                } else {
                    StockCommand::Restore { quantity }
                };
                let _ = item.execute(&cmd);
                prop_assert!(item.quantity_on_hand() >= Decimal::ZERO);
            }
        }
    }
}
