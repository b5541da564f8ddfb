use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{Aggregate, AggregateRoot, AssemblyId, DomainError, ItemRef};

/// One line of a bill of materials: how much of a component one assembly unit uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BomItem {
    pub component: ItemRef,
    pub quantity_required: Decimal,
}

/// Aggregate root: Assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assembly {
    id: AssemblyId,
    name: String,
    description: Option<String>,
    bom: Vec<BomItem>,
    ready_built: u64,
    total_shipped: u64,
    total_dismantled: u64,
    version: u64,
}

impl Assembly {
    /// A new assembly starts with an empty bill of materials and zero counters.
    pub fn new(
        id: AssemblyId,
        name: impl Into<String>,
        description: Option<String>,
    ) -> Result<Self, DomainError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        Ok(Self {
            id,
            name,
            description,
            bom: Vec::new(),
            ready_built: 0,
            total_shipped: 0,
            total_dismantled: 0,
            version: 0,
        })
    }

    pub fn id_typed(&self) -> AssemblyId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn bom(&self) -> &[BomItem] {
        &self.bom
    }

    pub fn ready_built(&self) -> u64 {
        self.ready_built
    }

    pub fn total_shipped(&self) -> u64 {
        self.total_shipped
    }

    pub fn total_dismantled(&self) -> u64 {
        self.total_dismantled
    }

    pub fn total_built(&self) -> u64 {
        self.ready_built.saturating_add(self.total_shipped)
    }
}

impl AggregateRoot for Assembly {
    type Id = AssemblyId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssemblyCommand {
    AddComponent {
        component: ItemRef,
        quantity_required: Decimal,
    },
    RemoveComponent {
        component: ItemRef,
    },
    Build {
        quantity: u64,
    },
    Ship {
        quantity: u64,
    },
    Dismantle {
        quantity: u64,
    },
}

/// Event: ComponentAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentAdded {
    pub assembly: AssemblyId,
    pub item: BomItem,
}

/// Event: ComponentRemoved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentRemoved {
    pub assembly: AssemblyId,
    pub component: ItemRef,
}

/// A change of `ready_built`, shared by built / shipped / dismantled events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterMoved {
    pub assembly: AssemblyId,
    pub quantity: u64,
    pub previous_ready: u64,
    pub new_ready: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssemblyEvent {
    ComponentAdded(ComponentAdded),
    ComponentRemoved(ComponentRemoved),
    Built(CounterMoved),
    Shipped(CounterMoved),
    Dismantled(CounterMoved),
}

impl AssemblyEvent {
    pub fn counter_move(&self) -> Option<&CounterMoved> {
        match self {
            AssemblyEvent::Built(m) | AssemblyEvent::Shipped(m) | AssemblyEvent::Dismantled(m) => {
                Some(m)
            }
            AssemblyEvent::ComponentAdded(_) | AssemblyEvent::ComponentRemoved(_) => None,
        }
    }
}

impl Aggregate for Assembly {
    type Command = AssemblyCommand;
    type Event = AssemblyEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            AssemblyEvent::ComponentAdded(e) => {
                self.bom.push(e.item.clone());
            }
            AssemblyEvent::ComponentRemoved(e) => {
                self.bom.retain(|b| b.component != e.component);
            }
            AssemblyEvent::Built(e) => {
                self.ready_built = e.new_ready;
            }
            AssemblyEvent::Shipped(e) => {
                self.ready_built = e.new_ready;
                self.total_shipped += e.quantity;
            }
            AssemblyEvent::Dismantled(e) => {
                self.ready_built = e.new_ready;
                self.total_dismantled += e.quantity;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            AssemblyCommand::AddComponent {
                component,
                quantity_required,
            } => self.handle_add_component(*component, *quantity_required),
            AssemblyCommand::RemoveComponent { component } => {
                self.handle_remove_component(*component)
            }
            AssemblyCommand::Build { quantity } => {
                self.ensure_bom()?;
                let quantity = Self::ensure_quantity(*quantity)?;
                let new_ready = self.ready_built.checked_add(quantity).ok_or_else(|| {
                    DomainError::validation(format!("{} ready-built count would overflow", self.id))
                })?;
                Ok(vec![AssemblyEvent::Built(CounterMoved {
                    assembly: self.id,
                    quantity,
                    previous_ready: self.ready_built,
                    new_ready,
                })])
            }
            AssemblyCommand::Ship { quantity } => {
                let moved = self.take_ready(*quantity)?;
                Ok(vec![AssemblyEvent::Shipped(moved)])
            }
            AssemblyCommand::Dismantle { quantity } => {
                self.ensure_bom()?;
                let moved = self.take_ready(*quantity)?;
                Ok(vec![AssemblyEvent::Dismantled(moved)])
            }
        }
    }
}

impl Assembly {
    fn ensure_quantity(quantity: u64) -> Result<u64, DomainError> {
        if quantity == 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        Ok(quantity)
    }

    fn ensure_bom(&self) -> Result<(), DomainError> {
        if self.bom.is_empty() {
            return Err(DomainError::validation(format!(
                "{} has an empty bill of materials",
                self.id
            )));
        }
        Ok(())
    }

    /// Built units were made from the current BOM; dismantling restores it.
    fn ensure_bom_editable(&self) -> Result<(), DomainError> {
        if self.ready_built > 0 {
            return Err(DomainError::validation(format!(
                "{} has {} built units; ship or dismantle them before editing its BOM",
                self.id, self.ready_built
            )));
        }
        Ok(())
    }

    fn take_ready(&self, quantity: u64) -> Result<CounterMoved, DomainError> {
        let quantity = Self::ensure_quantity(quantity)?;
        if quantity > self.ready_built {
            return Err(DomainError::InsufficientStock {
                subject: self.id.to_string(),
                requested: Decimal::from(quantity),
                available: Decimal::from(self.ready_built),
            });
        }
        Ok(CounterMoved {
            assembly: self.id,
            quantity,
            previous_ready: self.ready_built,
            new_ready: self.ready_built - quantity,
        })
    }

    fn handle_add_component(
        &self,
        component: ItemRef,
        quantity_required: Decimal,
    ) -> Result<Vec<AssemblyEvent>, DomainError> {
        self.ensure_bom_editable()?;
        if quantity_required <= Decimal::ZERO {
            return Err(DomainError::validation("quantity required must be positive"));
        }
        if self.bom.iter().any(|b| b.component == component) {
            return Err(DomainError::validation(format!(
                "{component} is already in the bill of materials of {}",
                self.id
            )));
        }
        Ok(vec![AssemblyEvent::ComponentAdded(ComponentAdded {
            assembly: self.id,
            item: BomItem {
                component,
                quantity_required,
            },
        })])
    }

    fn handle_remove_component(
        &self,
        component: ItemRef,
    ) -> Result<Vec<AssemblyEvent>, DomainError> {
        self.ensure_bom_editable()?;
        if !self.bom.iter().any(|b| b.component == component) {
            return Err(DomainError::not_found("bom item", component));
        }
        Ok(vec![AssemblyEvent::ComponentRemoved(ComponentRemoved {
            assembly: self.id,
            component,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use stockledger_core::{PartId, RawItemId};

    fn test_assembly() -> Assembly {
        let mut assembly = Assembly::new(AssemblyId::from_seq(1), "Gearbox", None).unwrap();
        assembly
            .execute(&AssemblyCommand::AddComponent {
                component: ItemRef::Part(PartId::from_seq(1)),
                quantity_required: dec!(2),
            })
            .unwrap();
        assembly
    }

    #[test]
    fn duplicate_components_are_rejected() {
        let assembly = test_assembly();
        let err = assembly
            .handle(&AssemblyCommand::AddComponent {
                component: ItemRef::Part(PartId::from_seq(1)),
                quantity_required: dec!(1),
            })
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn non_positive_bom_quantity_is_rejected() {
        let assembly = test_assembly();
        let err = assembly
            .handle(&AssemblyCommand::AddComponent {
                component: ItemRef::RawItem(RawItemId::from_seq(1)),
                quantity_required: dec!(0),
            })
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn build_ship_dismantle_move_counters() {
        let mut assembly = test_assembly();
        assembly
            .execute(&AssemblyCommand::Build { quantity: 5 })
            .unwrap();
        assembly
            .execute(&AssemblyCommand::Ship { quantity: 2 })
            .unwrap();
        let events = assembly
            .execute(&AssemblyCommand::Dismantle { quantity: 1 })
            .unwrap();

        let moved = events[0].counter_move().unwrap();
        assert_eq!(moved.previous_ready, 3);
        assert_eq!(moved.new_ready, 2);

        assert_eq!(assembly.ready_built(), 2);
        assert_eq!(assembly.total_shipped(), 2);
        assert_eq!(assembly.total_dismantled(), 1);
        assert_eq!(assembly.total_built(), 4);
    }

    #[test]
    fn cannot_ship_more_than_ready_built() {
        let mut assembly = test_assembly();
        assembly
            .execute(&AssemblyCommand::Build { quantity: 1 })
            .unwrap();
        let err = assembly
            .handle(&AssemblyCommand::Ship { quantity: 2 })
            .unwrap_err();
        assert!(matches!(err, DomainError::InsufficientStock { .. }));
    }

    #[test]
    fn empty_bom_blocks_build_and_dismantle() {
        let assembly = Assembly::new(AssemblyId::from_seq(2), "Shell", None).unwrap();
        assert!(matches!(
            assembly.handle(&AssemblyCommand::Build { quantity: 1 }),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            assembly.handle(&AssemblyCommand::Dismantle { quantity: 1 }),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn removing_unknown_component_is_not_found() {
        let mut assembly = test_assembly();
        let err = assembly
            .handle(&AssemblyCommand::RemoveComponent {
                component: ItemRef::Part(PartId::from_seq(9)),
            })
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));

        assembly
            .execute(&AssemblyCommand::RemoveComponent {
                component: ItemRef::Part(PartId::from_seq(1)),
            })
            .unwrap();
        assert!(assembly.bom().is_empty());
    }

    #[test]
    fn bom_is_locked_while_built_units_exist() {
        let mut assembly = test_assembly();
        assembly
            .execute(&AssemblyCommand::Build { quantity: 1 })
            .unwrap();

        let add = assembly
            .handle(&AssemblyCommand::AddComponent {
                component: ItemRef::Part(PartId::from_seq(5)),
                quantity_required: dec!(5),
            })
            .unwrap_err();
        assert!(matches!(add, DomainError::Validation(_)));
        let remove = assembly
            .handle(&AssemblyCommand::RemoveComponent {
                component: ItemRef::Part(PartId::from_seq(1)),
            })
            .unwrap_err();
        assert!(matches!(remove, DomainError::Validation(_)));

        assembly
            .execute(&AssemblyCommand::Ship { quantity: 1 })
            .unwrap();
        assembly
            .execute(&AssemblyCommand::AddComponent {
                component: ItemRef::Part(PartId::from_seq(5)),
                quantity_required: dec!(5),
            })
            .unwrap();
        assert_eq!(assembly.bom().len(), 2);
    }

    #[test]
    fn ready_built_overflow_is_rejected() {
        let mut assembly = test_assembly();
        assembly
            .execute(&AssemblyCommand::Build { quantity: u64::MAX })
            .unwrap();
        let err = assembly
            .handle(&AssemblyCommand::Build { quantity: 1 })
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(assembly.ready_built(), u64::MAX);
    }
}
