//! Stable identities for contracts and implementations.
//!
//! An identity is a printable name plus, for identities derived from a Rust
//! type, that type's `TypeId`. Equality and hashing include the `TypeId`, so
//! two types that happen to share a `type_name` stay distinct. A contract is
//! usually a trait object type (`ContractId::of::<dyn Storage>()`), an
//! implementation a concrete service type (`ImplementationId::of::<SqlStorage>()`).
//! Literal names (`ContractId::named("storage")`) are accepted too; the two
//! forms never compare equal to each other.

use std::any::TypeId;
use std::fmt;

use serde::{Serialize, Serializer};

/// Identity of an abstract contract that implementations may satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContractId {
    name: &'static str,
    type_id: Option<TypeId>,
}

impl ContractId {
    /// Contract identity derived from a Rust type, usually `dyn Trait`.
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            name: std::any::type_name::<T>(),
            type_id: Some(TypeId::of::<T>()),
        }
    }

    /// Contract identity from a literal name.
    #[must_use]
    pub const fn named(name: &'static str) -> Self {
        Self {
            name,
            type_id: None,
        }
    }

    /// Fully-qualified name of the contract.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Last path segment of the name, without a leading `dyn` or generics.
    #[must_use]
    pub fn short_name(&self) -> &'static str {
        short_name(self.name)
    }
}

impl fmt::Display for ContractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl Serialize for ContractId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name)
    }
}

/// Identity of a concrete implementation. One graph node per implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ImplementationId {
    name: &'static str,
    type_id: Option<TypeId>,
}

impl ImplementationId {
    /// Implementation identity derived from a concrete Rust type.
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            name: std::any::type_name::<T>(),
            type_id: Some(TypeId::of::<T>()),
        }
    }

    /// Implementation identity from a literal name.
    #[must_use]
    pub const fn named(name: &'static str) -> Self {
        Self {
            name,
            type_id: None,
        }
    }

    /// Fully-qualified name of the implementation.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Last path segment of the name, without generics.
    #[must_use]
    pub fn short_name(&self) -> &'static str {
        short_name(self.name)
    }
}

impl fmt::Display for ImplementationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl Serialize for ImplementationId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name)
    }
}

fn short_name(name: &'static str) -> &'static str {
    let name = name.strip_prefix("dyn ").unwrap_or(name);
    let head = name.split('<').next().unwrap_or(name);
    head.rsplit("::").next().unwrap_or(head)
}
