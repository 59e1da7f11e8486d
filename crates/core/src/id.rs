//! Strongly-typed identifiers used across the domain.
//!
//! Documents reference each other across crate boundaries (a sale points at a
//! purchase order, an application line points at a sale), so every document id
//! lives here rather than in its document's crate.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Raw identifier of a domain entity (UUIDv7, time-ordered).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(Uuid);

impl EntityId {
    /// Create a new identifier.
    ///
    /// Uses UUIDv7 (time-ordered). Prefer passing IDs explicitly in tests
    /// for determinism.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for EntityId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<Uuid> for EntityId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<EntityId> for Uuid {
    fn from(value: EntityId) -> Self {
        value.0
    }
}

impl FromStr for EntityId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid =
            Uuid::from_str(s).map_err(|e| DomainError::invalid_id(format!("EntityId: {e}")))?;
        Ok(Self(uuid))
    }
}

macro_rules! impl_document_id {
    ($($(#[$meta:meta])* $name:ident),+ $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(
                Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord,
                Serialize, Deserialize,
            )]
            #[serde(transparent)]
            pub struct $name(pub EntityId);

            impl $name {
                pub fn new() -> Self {
                    Self(EntityId::new())
                }
            }

            impl Default for $name {
                fn default() -> Self {
                    Self::new()
                }
            }

            impl core::fmt::Display for $name {
                fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                    core::fmt::Display::fmt(&self.0, f)
                }
            }

            impl From<EntityId> for $name {
                fn from(value: EntityId) -> Self {
                    Self(value)
                }
            }
        )+
    };
}

impl_document_id!(
    /// Counterparty identifier.
    CounterpartyId,
    /// Product identifier.
    ProductId,
    /// Sales order identifier.
    SalesOrderId,
    /// Purchase order identifier.
    PurchaseOrderId,
    /// Sale identifier.
    SaleId,
    /// Purchase identifier.
    PurchaseId,
    /// Collection identifier.
    CollectionId,
    /// Payment identifier.
    PaymentId,
    /// Credit note identifier.
    CreditNoteId,
);
