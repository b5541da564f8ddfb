//! Polymorphic reference to a stock-carrying item.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::id::{DocumentNumber, IdPrefix, PartId, RawItemId, ScrapItemId};

/// The three kinds of item that carry a quantity on hand.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Part,
    RawItem,
    ScrapItem,
}

impl ItemKind {
    pub fn prefix(self) -> IdPrefix {
        match self {
            ItemKind::Part => IdPrefix::Part,
            ItemKind::RawItem => IdPrefix::RawItem,
            ItemKind::ScrapItem => IdPrefix::ScrapItem,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ItemKind::Part => "part",
            ItemKind::RawItem => "raw_item",
            ItemKind::ScrapItem => "scrap_item",
        }
    }
}

/// Reference to a Part, RawItem or ScrapItem.
///
/// Serialized as its document number; the prefix carries the kind.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ItemRef {
    Part(PartId),
    RawItem(RawItemId),
    Scrap(ScrapItemId),
}

impl ItemRef {
    pub fn kind(&self) -> ItemKind {
        match self {
            ItemRef::Part(_) => ItemKind::Part,
            ItemRef::RawItem(_) => ItemKind::RawItem,
            ItemRef::Scrap(_) => ItemKind::ScrapItem,
        }
    }

    pub fn from_kind(kind: ItemKind, seq: u64) -> Self {
        match kind {
            ItemKind::Part => ItemRef::Part(PartId::from_seq(seq)),
            ItemKind::RawItem => ItemRef::RawItem(RawItemId::from_seq(seq)),
            ItemKind::ScrapItem => ItemRef::Scrap(ScrapItemId::from_seq(seq)),
        }
    }

    pub fn document_number(&self) -> DocumentNumber {
        match self {
            ItemRef::Part(id) => id.document_number(),
            ItemRef::RawItem(id) => id.document_number(),
            ItemRef::Scrap(id) => id.document_number(),
        }
    }
}

impl From<PartId> for ItemRef {
    fn from(value: PartId) -> Self {
        ItemRef::Part(value)
    }
}

impl From<RawItemId> for ItemRef {
    fn from(value: RawItemId) -> Self {
        ItemRef::RawItem(value)
    }
}

impl From<ScrapItemId> for ItemRef {
    fn from(value: ScrapItemId) -> Self {
        ItemRef::Scrap(value)
    }
}

impl core::fmt::Display for ItemRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.document_number(), f)
    }
}

impl FromStr for ItemRef {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let number: DocumentNumber = s.parse()?;
        match number.prefix() {
            IdPrefix::Part => Ok(ItemRef::from_kind(ItemKind::Part, number.seq())),
            IdPrefix::RawItem => Ok(ItemRef::from_kind(ItemKind::RawItem, number.seq())),
            IdPrefix::ScrapItem => Ok(ItemRef::from_kind(ItemKind::ScrapItem, number.seq())),
            other => Err(DomainError::validation(format!(
                "{s} is a {other} number, not a stock item"
            ))),
        }
    }
}

impl TryFrom<String> for ItemRef {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ItemRef> for String {
    fn from(value: ItemRef) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_ref_round_trips_through_its_document_number() {
        let raw = ItemRef::RawItem(RawItemId::from_seq(12));
        assert_eq!(raw.to_string(), "RI000012");
        assert_eq!("RI000012".parse::<ItemRef>().unwrap(), raw);
        assert_eq!(raw.kind(), ItemKind::RawItem);
    }

    #[test]
    fn non_stock_numbers_are_not_item_refs() {
        assert!("ASM000001".parse::<ItemRef>().is_err());
        assert!("TXN000001".parse::<ItemRef>().is_err());
    }
}
