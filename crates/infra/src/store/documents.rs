//! Collection bindings for the domain records.

use serde::{Deserialize, Serialize};

use stockledger_assembly::Assembly;
use stockledger_core::{AggregateRoot, IdPrefix, RawItemId, ScrapItemId};
use stockledger_inventory::StockItem;
use stockledger_ledger::LedgerEntry;
use stockledger_manufacturing::{ManufacturingRecord, PendingPart};
use stockledger_purchasing::{PurchaseOrder, Receipt};

use super::Document;

pub const STOCK_ITEMS: &str = "stock_items";
pub const LEDGER: &str = "ledger";
pub const ASSEMBLIES: &str = "assemblies";
pub const PURCHASE_ORDERS: &str = "purchase_orders";
pub const RECEIPTS: &str = "receipts";
pub const PENDING_PARTS: &str = "pending_parts";
pub const MANUFACTURING_RECORDS: &str = "manufacturing_records";
pub const SCRAP_LINKS: &str = "scrap_links";

/// Collection whose keys are numbered with `prefix`.
pub fn collection_for(prefix: IdPrefix) -> &'static str {
    match prefix {
        IdPrefix::Transaction => LEDGER,
        IdPrefix::Assembly => ASSEMBLIES,
        IdPrefix::PartOrder | IdPrefix::RawItemOrder => PURCHASE_ORDERS,
        IdPrefix::Receipt => RECEIPTS,
        IdPrefix::Part | IdPrefix::RawItem | IdPrefix::ScrapItem => STOCK_ITEMS,
        IdPrefix::PendingPart => PENDING_PARTS,
        IdPrefix::ManufacturingRecord => MANUFACTURING_RECORDS,
    }
}

/// The scrap item that collects waste of one raw item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapLink {
    pub raw_item: RawItemId,
    pub scrap_item: ScrapItemId,
}

impl Document for ScrapLink {
    const COLLECTION: &'static str = SCRAP_LINKS;
    const ENTITY: &'static str = "scrap link";

    fn key(&self) -> String {
        self.raw_item.to_string()
    }
}

impl Document for StockItem {
    const COLLECTION: &'static str = STOCK_ITEMS;
    const ENTITY: &'static str = "stock item";

    fn key(&self) -> String {
        self.item_ref().to_string()
    }
}

impl Document for LedgerEntry {
    const COLLECTION: &'static str = LEDGER;
    const ENTITY: &'static str = "ledger entry";

    fn key(&self) -> String {
        self.transaction_id.to_string()
    }
}

impl Document for Assembly {
    const COLLECTION: &'static str = ASSEMBLIES;
    const ENTITY: &'static str = "assembly";

    fn key(&self) -> String {
        self.id().to_string()
    }
}

impl Document for PurchaseOrder {
    const COLLECTION: &'static str = PURCHASE_ORDERS;
    const ENTITY: &'static str = "purchase order";

    fn key(&self) -> String {
        self.id().to_string()
    }
}

impl Document for Receipt {
    const COLLECTION: &'static str = RECEIPTS;
    const ENTITY: &'static str = "receipt";

    fn key(&self) -> String {
        self.id.to_string()
    }
}

impl Document for PendingPart {
    const COLLECTION: &'static str = PENDING_PARTS;
    const ENTITY: &'static str = "pending part";

    fn key(&self) -> String {
        self.id().to_string()
    }
}

impl Document for ManufacturingRecord {
    const COLLECTION: &'static str = MANUFACTURING_RECORDS;
    const ENTITY: &'static str = "manufacturing record";

    fn key(&self) -> String {
        self.id.to_string()
    }
}
