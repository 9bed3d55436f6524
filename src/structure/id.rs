use std::fmt;
use serde::{Serialize, Deserialize};
use uuid::Uuid;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::Value;

/// Kind of identity a structure type uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdKind {
    Identity,  // Sequential integer, checked out in ranges
    Guid,      // Generated by the builder when unset
}

/// Identity of a stored structure. Construction validates, so a value of
/// this type is always a usable, assigned identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StructureId {
    Identity(i64),
    Guid(Uuid),
}

impl StructureId {
    pub fn identity(value: i64) -> Result<Self> {
        if value < 1 {
            return Err(Error::new(
                ErrorKind::InvalidIdentity,
                format!("Identity must be >= 1, got {}", value),
            ));
        }
        Ok(StructureId::Identity(value))
    }

    pub fn guid(value: Uuid) -> Result<Self> {
        if value.is_nil() {
            return Err(Error::new(
                ErrorKind::InvalidIdentity,
                "Guid identity must not be the nil guid".to_string(),
            ));
        }
        Ok(StructureId::Guid(value))
    }

    /// New time-ordered guid, so consecutive inserts land close together
    pub fn new_guid() -> Self {
        StructureId::Guid(Uuid::now_v7())
    }

    pub fn kind(&self) -> IdKind {
        match self {
            StructureId::Identity(_) => IdKind::Identity,
            StructureId::Guid(_) => IdKind::Guid,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            StructureId::Identity(i) => Value::Integer(*i),
            StructureId::Guid(g) => Value::Guid(*g),
        }
    }
}

impl fmt::Display for StructureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StructureId::Identity(i) => write!(f, "{}", i),
            StructureId::Guid(g) => write!(f, "{}", g.hyphenated()),
        }
    }
}

/// Contiguous block of integer identities handed out by a checkout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityRange {
    pub start: i64,
    pub count: usize,
}

impl IdentityRange {
    pub fn new(start: i64, count: usize) -> Result<Self> {
        if start < 1 {
            return Err(Error::new(
                ErrorKind::InvalidIdentity,
                format!("Identity range must start at >= 1, got {}", start),
            ));
        }
        Ok(IdentityRange { start, count })
    }

    /// Identity for the item at `offset` within the batch
    pub fn at(&self, offset: usize) -> Result<StructureId> {
        if offset >= self.count {
            return Err(Error::new(
                ErrorKind::InvalidIdentity,
                format!("Offset {} outside checked out range of {}", offset, self.count),
            ));
        }
        StructureId::identity(self.start + offset as i64)
    }
}

/// Hands out integer identities. Implemented by the storage layer, which
/// owns the identity sequence per structure type.
pub trait IdentityCheckout {
    fn checkout(&mut self, structure: &str, count: usize) -> Result<IdentityRange>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unassigned_values() {
        assert!(StructureId::identity(0).is_err());
        assert!(StructureId::identity(-3).is_err());
        assert!(StructureId::guid(Uuid::nil()).is_err());
        assert!(StructureId::identity(1).is_ok());
    }

    #[test]
    fn new_guids_are_not_nil_and_ordered() {
        let a = StructureId::new_guid();
        let b = StructureId::new_guid();
        assert_ne!(a, b);
        assert!(matches!(a, StructureId::Guid(g) if !g.is_nil()));
    }

    #[test]
    fn range_offsets_follow_batch_order() {
        let range = IdentityRange::new(10, 3).unwrap();
        assert_eq!(range.at(0).unwrap(), StructureId::Identity(10));
        assert_eq!(range.at(2).unwrap(), StructureId::Identity(12));
        assert!(range.at(3).is_err());
    }
}
