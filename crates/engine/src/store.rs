use std::collections::HashMap;

use ledgerflow_core::{DomainError, DomainResult, Entity};
use ledgerflow_parties::Counterparty;
use ledgerflow_products::Product;
use ledgerflow_purchasing::{Purchase, PurchaseOrder};
use ledgerflow_sales::{Sale, SalesOrder};
use ledgerflow_settlements::{Collection, CreditNote, Payment};

/// Typed in-memory table, keyed by the entity's own id type.
///
/// The [`Entity`] bound is the whole persistence contract: anything with a
/// typed id can be stored, nothing else can.
#[derive(Debug, Clone)]
pub struct TypedStore<T: Entity> {
    items: HashMap<T::Id, T>,
}

impl<T: Entity> Default for TypedStore<T> {
    fn default() -> Self {
        Self {
            items: HashMap::new(),
        }
    }
}

impl<T: Entity> TypedStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: T::Id) -> DomainResult<&T> {
        self.items.get(&id).ok_or(DomainError::NotFound)
    }

    pub fn get_mut(&mut self, id: T::Id) -> DomainResult<&mut T> {
        self.items.get_mut(&id).ok_or(DomainError::NotFound)
    }

    pub fn find(&self, id: T::Id) -> Option<&T> {
        self.items.get(&id)
    }

    /// Insert a new entity; duplicate ids are a conflict.
    pub fn insert(&mut self, item: T) -> DomainResult<()> {
        let id = item.id();
        if self.items.contains_key(&id) {
            return Err(DomainError::conflict("entity already exists"));
        }
        self.items.insert(id, item);
        Ok(())
    }

    /// Write an entity back, replacing the stored copy.
    pub fn put(&mut self, item: T) {
        self.items.insert(item.id(), item);
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.items.values_mut()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Every document table the engine operates on.
#[derive(Debug, Clone, Default)]
pub struct Store {
    pub counterparties: TypedStore<Counterparty>,
    pub products: TypedStore<Product>,
    pub sales_orders: TypedStore<SalesOrder>,
    pub purchase_orders: TypedStore<PurchaseOrder>,
    pub sales: TypedStore<Sale>,
    pub purchases: TypedStore<Purchase>,
    pub collections: TypedStore<Collection>,
    pub payments: TypedStore<Payment>,
    pub credit_notes: TypedStore<CreditNote>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }
}
