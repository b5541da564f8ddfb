use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{
    Aggregate, AggregateRoot, DomainError, DomainResult, ItemRef, PartId, PendingPartId,
    RawItemId, Shortage,
};

/// Raw material requested for a production run, per unit produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMaterialUsage {
    pub raw_item: RawItemId,
    pub quantity_per_unit: Decimal,
}

/// What the stock store knows about a raw item when planning a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawStock {
    pub name: String,
    pub on_hand: Decimal,
    pub unit_cost: Decimal,
}

/// Raw material actually consumed by a production run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMaterialConsumption {
    pub raw_item: RawItemId,
    pub name: String,
    pub quantity_per_unit: Decimal,
    pub total_consumed: Decimal,
    pub unit_cost: Decimal,
}

impl RawMaterialConsumption {
    pub fn cost(&self) -> Decimal {
        self.total_consumed * self.unit_cost
    }
}

/// Work out what a run of `quantity` consumes.
///
/// Fails with `InsufficientRawStock` listing every raw item that cannot cover
/// its total, so nothing is withdrawn unless the whole run fits.
pub fn consumption_plan<F>(
    quantity: Decimal,
    usages: &[RawMaterialUsage],
    mut lookup: F,
) -> DomainResult<Vec<RawMaterialConsumption>>
where
    F: FnMut(RawItemId) -> DomainResult<RawStock>,
{
    if quantity <= Decimal::ZERO {
        return Err(DomainError::validation("quantity to make must be positive"));
    }
    if usages.is_empty() {
        return Err(DomainError::validation("production needs at least one raw material"));
    }

    let mut plan = Vec::with_capacity(usages.len());
    let mut shortages = Vec::new();
    let mut run_cost = Decimal::ZERO;
    for (idx, usage) in usages.iter().enumerate() {
        if usages[..idx].iter().any(|u| u.raw_item == usage.raw_item) {
            return Err(DomainError::validation(format!(
                "{} is listed twice",
                usage.raw_item
            )));
        }
        if usage.quantity_per_unit <= Decimal::ZERO {
            return Err(DomainError::validation("quantity used per unit must be positive"));
        }

        let stock = lookup(usage.raw_item)?;
        let total = usage
            .quantity_per_unit
            .checked_mul(quantity)
            .ok_or_else(|| too_large(usage.raw_item, "consumption"))?;
        run_cost = total
            .checked_mul(stock.unit_cost)
            .and_then(|cost| run_cost.checked_add(cost))
            .ok_or_else(|| too_large(usage.raw_item, "raw material cost"))?;
        if total > stock.on_hand {
            shortages.push(Shortage {
                item: ItemRef::RawItem(usage.raw_item),
                required: total,
                available: stock.on_hand,
            });
        }
        plan.push(RawMaterialConsumption {
            raw_item: usage.raw_item,
            name: stock.name,
            quantity_per_unit: usage.quantity_per_unit,
            total_consumed: total,
            unit_cost: stock.unit_cost,
        });
    }

    if !shortages.is_empty() {
        return Err(DomainError::InsufficientRawStock { shortages });
    }
    Ok(plan)
}

fn too_large(raw_item: RawItemId, what: &str) -> DomainError {
    DomainError::validation(format!("{what} of {raw_item} is too large to represent"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingPartStatus {
    PendingReview,
    Accepted,
    Rejected,
}

/// Inspection outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityControl {
    pub passed_quantity: Decimal,
    pub rejected_quantity: Decimal,
    pub reason: Option<String>,
    pub inspector: String,
    pub reviewed_at: DateTime<Utc>,
}

/// Aggregate root: PendingPart.
///
/// Finished parts held for inspection. Leaves `PendingReview` exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPart {
    id: PendingPartId,
    part: PartId,
    part_name: String,
    part_type: Option<String>,
    quantity_created: Decimal,
    raw_materials: Vec<RawMaterialConsumption>,
    status: PendingPartStatus,
    quality_control: Option<QualityControl>,
    notes: Option<String>,
    created_by: String,
    created_at: DateTime<Utc>,
    version: u64,
}

impl PendingPart {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: PendingPartId,
        part: PartId,
        part_name: impl Into<String>,
        part_type: Option<String>,
        quantity_created: Decimal,
        raw_materials: Vec<RawMaterialConsumption>,
        created_by: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if quantity_created <= Decimal::ZERO {
            return Err(DomainError::validation("quantity created must be positive"));
        }
        if raw_materials.is_empty() {
            return Err(DomainError::validation("pending part needs a raw material bill"));
        }
        let created_by = created_by.into();
        if created_by.trim().is_empty() {
            return Err(DomainError::validation("pending part requires a creator"));
        }

        Ok(Self {
            id,
            part,
            part_name: part_name.into(),
            part_type,
            quantity_created,
            raw_materials,
            status: PendingPartStatus::PendingReview,
            quality_control: None,
            notes: None,
            created_by,
            created_at,
            version: 0,
        })
    }

    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes.filter(|n| !n.trim().is_empty());
        self
    }

    pub fn id_typed(&self) -> PendingPartId {
        self.id
    }

    pub fn part(&self) -> PartId {
        self.part
    }

    pub fn part_name(&self) -> &str {
        &self.part_name
    }

    pub fn part_type(&self) -> Option<&str> {
        self.part_type.as_deref()
    }

    pub fn quantity_created(&self) -> Decimal {
        self.quantity_created
    }

    pub fn raw_materials(&self) -> &[RawMaterialConsumption] {
        &self.raw_materials
    }

    pub fn total_raw_cost(&self) -> Decimal {
        self.raw_materials.iter().map(RawMaterialConsumption::cost).sum()
    }

    pub fn status(&self) -> PendingPartStatus {
        self.status
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.status, PendingPartStatus::PendingReview)
    }

    pub fn quality_control(&self) -> Option<&QualityControl> {
        self.quality_control.as_ref()
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn created_by(&self) -> &str {
        &self.created_by
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl AggregateRoot for PendingPart {
    type Id = PendingPartId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ReviewAction {
    Accept { passed: Decimal, rejected: Decimal },
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PendingPartCommand {
    Review {
        action: ReviewAction,
        reason: Option<String>,
        inspector: String,
        reviewed_at: DateTime<Utc>,
    },
}

/// Event: Reviewed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reviewed {
    pub pending_part: PendingPartId,
    pub status: PendingPartStatus,
    pub quality_control: QualityControl,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PendingPartEvent {
    Reviewed(Reviewed),
}

impl Aggregate for PendingPart {
    type Command = PendingPartCommand;
    type Event = PendingPartEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PendingPartEvent::Reviewed(e) => {
                self.status = e.status;
                self.quality_control = Some(e.quality_control.clone());
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PendingPartCommand::Review {
                action,
                reason,
                inspector,
                reviewed_at,
            } => self.handle_review(action, reason.as_deref(), inspector, *reviewed_at),
        }
    }
}

impl PendingPart {
    fn handle_review(
        &self,
        action: &ReviewAction,
        reason: Option<&str>,
        inspector: &str,
        reviewed_at: DateTime<Utc>,
    ) -> Result<Vec<PendingPartEvent>, DomainError> {
        if !self.is_pending() {
            return Err(DomainError::AlreadyReviewed(self.id.to_string()));
        }
        if inspector.trim().is_empty() {
            return Err(DomainError::validation("review requires an inspector"));
        }

        let (status, passed, rejected) = match action {
            ReviewAction::Accept { passed, rejected } => {
                if *passed < Decimal::ZERO || *rejected < Decimal::ZERO {
                    return Err(DomainError::validation(
                        "passed and rejected quantities cannot be negative",
                    ));
                }
                if *passed + *rejected != self.quantity_created {
                    return Err(DomainError::QuantityMismatch {
                        expected: self.quantity_created,
                        passed: *passed,
                        rejected: *rejected,
                    });
                }
                (PendingPartStatus::Accepted, *passed, *rejected)
            }
            ReviewAction::Reject => (
                PendingPartStatus::Rejected,
                Decimal::ZERO,
                self.quantity_created,
            ),
        };

        Ok(vec![PendingPartEvent::Reviewed(Reviewed {
            pending_part: self.id,
            status,
            quality_control: QualityControl {
                passed_quantity: passed,
                rejected_quantity: rejected,
                reason: reason.map(str::to_owned).filter(|r| !r.trim().is_empty()),
                inspector: inspector.to_owned(),
                reviewed_at,
            },
        })])
    }
}
