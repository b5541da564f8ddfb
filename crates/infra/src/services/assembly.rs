use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument};

use stockledger_assembly::{
    Assembly, AssemblyCommand, AssemblyEvent, Buildability, CounterMoved, bom,
};
use stockledger_core::{Aggregate, AssemblyId, DomainError, IdPrefix, ItemRef};
use stockledger_inventory::{StockCommand, StockItem};
use stockledger_ledger::{LedgerEntry, LedgerSubject, NewLedgerEntry, TransactionType};

use super::context::TxContext;
use crate::engine::InventoryEngine;
use crate::error::ServiceResult;
use crate::store::{InventoryStore, UnitOfWork};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRequest {
    pub assembly: AssemblyId,
    pub quantity: u64,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingInfo {
    pub customer: Option<String>,
    pub destination: Option<String>,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipRequest {
    pub assembly: AssemblyId,
    pub quantity: u64,
    #[serde(default)]
    pub shipping: ShippingInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DismantleRequest {
    pub assembly: AssemblyId,
    pub quantity: u64,
    pub reason: Option<String>,
}

/// Result of a build or dismantle: the updated assembly and one entry per component.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildOutcome {
    pub assembly: Assembly,
    pub entries: Vec<LedgerEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShipOutcome {
    pub assembly: Assembly,
    pub entry: LedgerEntry,
}

impl<S: InventoryStore> InventoryEngine<S> {
    #[instrument(skip(self, description), err)]
    pub fn create_assembly(
        &self,
        name: &str,
        description: Option<String>,
        actor: &str,
    ) -> ServiceResult<Assembly> {
        let assembly = self.transact(|ctx| {
            let id = AssemblyId::from_seq(ctx.next_seq(IdPrefix::Assembly));
            let assembly = Assembly::new(id, name, description.clone())?;
            ctx.uow.insert(&assembly)?;
            Ok(assembly)
        })?;
        info!(assembly = %assembly.id_typed(), %actor, "assembly created");
        Ok(assembly)
    }

    #[instrument(skip(self), err)]
    pub fn add_bom_item(
        &self,
        assembly: AssemblyId,
        component: ItemRef,
        quantity_required: Decimal,
    ) -> ServiceResult<Assembly> {
        self.transact(|ctx| {
            if matches!(component, ItemRef::Scrap(_)) {
                return Err(
                    DomainError::validation("scrap items cannot be assembly components").into(),
                );
            }
            let _: StockItem = ctx.fetch(component)?;
            let mut target: Assembly = ctx.fetch(assembly)?;
            target.execute(&AssemblyCommand::AddComponent {
                component,
                quantity_required,
            })?;
            ctx.uow.save(&target)?;
            Ok(target)
        })
    }

    #[instrument(skip(self), err)]
    pub fn remove_bom_item(
        &self,
        assembly: AssemblyId,
        component: ItemRef,
    ) -> ServiceResult<Assembly> {
        self.transact(|ctx| {
            let mut target: Assembly = ctx.fetch(assembly)?;
            target.execute(&AssemblyCommand::RemoveComponent { component })?;
            ctx.uow.save(&target)?;
            Ok(target)
        })
    }

    /// Read-only buildability check; never writes.
    #[instrument(skip(self), err)]
    pub fn can_build(&self, assembly: AssemblyId, quantity: u64) -> ServiceResult<Buildability> {
        let target: Assembly = self.get(assembly)?;
        let mut levels = HashMap::new();
        for line in target.bom() {
            let stock: StockItem = self.get(line.component)?;
            levels.insert(line.component, stock.quantity_on_hand());
        }
        bom::can_build(&target, quantity, |item| on_hand(&levels, item)).map_err(Into::into)
    }

    /// Consume components and raise `ready_built`.
    ///
    /// Fails with `CannotBuild` (listing every short component) before any
    /// stock is touched.
    #[instrument(
        skip(self, request),
        fields(assembly = %request.assembly, quantity = request.quantity),
        err
    )]
    pub fn build_assembly(
        &self,
        request: BuildRequest,
        actor: &str,
    ) -> ServiceResult<BuildOutcome> {
        let outcome = self.transact(|ctx| {
            let mut assembly: Assembly = ctx.fetch(request.assembly)?;
            let levels = component_levels(ctx, &assembly)?;
            let check = bom::can_build(&assembly, request.quantity, |item| on_hand(&levels, item))?
                .ensure_feasible()?;

            let events = assembly.execute(&AssemblyCommand::Build {
                quantity: request.quantity,
            })?;
            let moved = counter_move(&events)?;

            let mut entries = Vec::with_capacity(check.requirements.len());
            for req in &check.requirements {
                let (stock, change) = ctx.move_stock(
                    req.component,
                    StockCommand::Withdraw {
                        quantity: req.required,
                    },
                )?;
                let now = ctx.now();
                let entry = ctx.record(
                    NewLedgerEntry::new(
                        LedgerSubject::Item(req.component),
                        TransactionType::AssemblyBuild,
                        req.required,
                        stock.cost_per_unit(),
                        change.previous,
                        change.new,
                        actor,
                        now,
                    )
                    .with_reference(assembly.id_typed().to_string(), "assembly")
                    .with_assembly(assembly.id_typed())
                    .with_notes(request.notes.clone())
                    .with_metadata(json!({
                        "assembly_units": moved.quantity,
                        "per_unit": req.per_unit,
                    })),
                )?;
                entries.push(entry);
            }

            ctx.uow.save(&assembly)?;
            Ok(BuildOutcome { assembly, entries })
        })?;

        info!(
            assembly = %outcome.assembly.id_typed(),
            quantity = request.quantity,
            ready_built = outcome.assembly.ready_built(),
            "assembly built"
        );
        Ok(outcome)
    }

    /// Lower `ready_built`. Components are not touched.
    #[instrument(
        skip(self, request),
        fields(assembly = %request.assembly, quantity = request.quantity),
        err
    )]
    pub fn ship_assembly(&self, request: ShipRequest, actor: &str) -> ServiceResult<ShipOutcome> {
        let outcome = self.transact(|ctx| {
            let mut assembly: Assembly = ctx.fetch(request.assembly)?;
            let events = assembly.execute(&AssemblyCommand::Ship {
                quantity: request.quantity,
            })?;
            let moved = counter_move(&events)?;

            let now = ctx.now();
            let entry = ctx.record(
                NewLedgerEntry::new(
                    LedgerSubject::Assembly(assembly.id_typed()),
                    TransactionType::AssemblyShip,
                    Decimal::from(moved.quantity),
                    Decimal::ZERO,
                    Decimal::from(moved.previous_ready),
                    Decimal::from(moved.new_ready),
                    actor,
                    now,
                )
                .with_reference(assembly.id_typed().to_string(), "assembly_shipment")
                .with_assembly(assembly.id_typed())
                .with_notes(request.shipping.notes.clone())
                .with_metadata(json!({
                    "customer": request.shipping.customer,
                    "destination": request.shipping.destination,
                    "tracking_number": request.shipping.tracking_number,
                })),
            )?;

            ctx.uow.save(&assembly)?;
            Ok(ShipOutcome { assembly, entry })
        })?;

        info!(
            assembly = %outcome.assembly.id_typed(),
            quantity = request.quantity,
            ready_built = outcome.assembly.ready_built(),
            "assembly shipped"
        );
        Ok(outcome)
    }

    /// Take built units apart and return their components to stock.
    #[instrument(
        skip(self, request),
        fields(assembly = %request.assembly, quantity = request.quantity),
        err
    )]
    pub fn dismantle_assembly(
        &self,
        request: DismantleRequest,
        actor: &str,
    ) -> ServiceResult<BuildOutcome> {
        let outcome = self.transact(|ctx| {
            let mut assembly: Assembly = ctx.fetch(request.assembly)?;
            let events = assembly.execute(&AssemblyCommand::Dismantle {
                quantity: request.quantity,
            })?;
            let moved = counter_move(&events)?;

            let requirements = bom::requirements(assembly.bom(), moved.quantity)?;
            let mut entries = Vec::with_capacity(requirements.len());
            for req in &requirements {
                let (stock, change) = ctx.move_stock(
                    req.component,
                    StockCommand::Restore {
                        quantity: req.required,
                    },
                )?;
                let now = ctx.now();
                let entry = ctx.record(
                    NewLedgerEntry::new(
                        LedgerSubject::Item(req.component),
                        TransactionType::AssemblyDisassemble,
                        req.required,
                        stock.cost_per_unit(),
                        change.previous,
                        change.new,
                        actor,
                        now,
                    )
                    .with_reference(assembly.id_typed().to_string(), "assembly")
                    .with_assembly(assembly.id_typed())
                    .with_notes(request.reason.clone())
                    .with_metadata(json!({
                        "assembly_units": moved.quantity,
                        "per_unit": req.per_unit,
                    })),
                )?;
                entries.push(entry);
            }

            ctx.uow.save(&assembly)?;
            Ok(BuildOutcome { assembly, entries })
        })?;

        info!(
            assembly = %outcome.assembly.id_typed(),
            quantity = request.quantity,
            ready_built = outcome.assembly.ready_built(),
            "assembly dismantled"
        );
        Ok(outcome)
    }
}

fn component_levels<U: UnitOfWork>(
    ctx: &mut TxContext<'_, U>,
    assembly: &Assembly,
) -> ServiceResult<HashMap<ItemRef, Decimal>> {
    let mut levels = HashMap::new();
    for line in assembly.bom() {
        let stock: StockItem = ctx.fetch(line.component)?;
        levels.insert(line.component, stock.quantity_on_hand());
    }
    Ok(levels)
}

fn on_hand(levels: &HashMap<ItemRef, Decimal>, item: ItemRef) -> Result<Decimal, DomainError> {
    levels
        .get(&item)
        .copied()
        .ok_or_else(|| DomainError::not_found("stock item", item))
}

fn counter_move(events: &[AssemblyEvent]) -> Result<CounterMoved, DomainError> {
    events
        .iter()
        .find_map(AssemblyEvent::counter_move)
        .cloned()
        .ok_or_else(|| DomainError::invariant("assembly counter did not move"))
}
