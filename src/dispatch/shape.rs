//! Shape descriptors for handler parameters and providers.
//!
//! A shape is the declared contract of a parameter or provider. Shapes come in
//! two families:
//!
//! - **Reserved** shapes name the per-request values the dispatcher creates
//!   for every call (context, inbound request, response sink).
//! - **Provided** shapes name singleton services, keyed by a stable type
//!   identifier plus how the service is provided: as a concrete type or as a
//!   capability (trait object), by value or shared.
//!
//! Matching between a parameter and a provider is exact on all three
//! coordinates (type key, kind, binding).

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

use super::context::{InboundRequest, RequestContext, ResponseSink};

// =============================================================================
// Provider Key
// =============================================================================

/// Stable identifier of a provided type.
///
/// Equality and hashing use the `TypeId` only; the type name is carried for
/// diagnostics.
#[derive(Clone, Copy)]
pub struct ProviderKey {
    id: TypeId,
    name: &'static str,
}

impl ProviderKey {
    /// Key for `T`, which may be a trait object type such as `dyn Repository`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Fully qualified type name.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for ProviderKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ProviderKey {}

impl Hash for ProviderKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ProviderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

// =============================================================================
// Shape
// =============================================================================

/// Whether a provider is registered as its concrete type or as a capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Concrete,
    Capability,
}

/// Whether a parameter receives its own copy or a shared handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Binding {
    /// The parameter receives a clone of the provided value
    Value,
    /// The parameter receives an `Arc` to the provided value
    Shared,
}

/// The closed set of per-request values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReservedShape {
    Context,
    Request,
    ResponseSink,
}

impl ReservedShape {
    /// Every reserved shape.
    pub const ALL: [ReservedShape; 3] = [
        ReservedShape::Context,
        ReservedShape::Request,
        ReservedShape::ResponseSink,
    ];

    /// The type key the reserved value is delivered as.
    pub fn key(&self) -> ProviderKey {
        match self {
            ReservedShape::Context => ProviderKey::of::<RequestContext>(),
            ReservedShape::Request => ProviderKey::of::<InboundRequest>(),
            ReservedShape::ResponseSink => ProviderKey::of::<ResponseSink>(),
        }
    }

    /// The reserved shape delivered as `key`, if any.
    pub fn for_key(key: ProviderKey) -> Option<ReservedShape> {
        Self::ALL.into_iter().find(|reserved| reserved.key() == key)
    }
}

/// Declared shape of a handler parameter or a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    /// A per-request value
    Reserved(ReservedShape),

    /// A singleton service
    Provided {
        key: ProviderKey,
        kind: ProviderKind,
        binding: Binding,
    },
}

impl Shape {
    /// Concrete `T`, delivered by value.
    pub fn value<T: 'static>() -> Self {
        Shape::Provided {
            key: ProviderKey::of::<T>(),
            kind: ProviderKind::Concrete,
            binding: Binding::Value,
        }
    }

    /// Concrete `T`, delivered as a shared `Arc<T>`.
    pub fn shared<T: 'static>() -> Self {
        Shape::Provided {
            key: ProviderKey::of::<T>(),
            kind: ProviderKind::Concrete,
            binding: Binding::Shared,
        }
    }

    /// Capability `I` (a trait object type), delivered as `Arc<I>`.
    pub fn capability<I: ?Sized + 'static>() -> Self {
        Shape::Provided {
            key: ProviderKey::of::<I>(),
            kind: ProviderKind::Capability,
            binding: Binding::Shared,
        }
    }

    pub fn is_reserved(&self) -> bool {
        matches!(self, Shape::Reserved(_))
    }

    /// Type key of the shape.
    pub fn key(&self) -> ProviderKey {
        match self {
            Shape::Reserved(reserved) => reserved.key(),
            Shape::Provided { key, .. } => *key,
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Reserved(ReservedShape::Context) => f.write_str("<request context>"),
            Shape::Reserved(ReservedShape::Request) => f.write_str("<inbound request>"),
            Shape::Reserved(ReservedShape::ResponseSink) => f.write_str("<response sink>"),
            Shape::Provided {
                key,
                kind: ProviderKind::Capability,
                ..
            } => write!(f, "capability {}", key.name()),
            Shape::Provided {
                key,
                binding: Binding::Shared,
                ..
            } => write!(f, "Arc<{}>", key.name()),
            Shape::Provided { key, .. } => f.write_str(key.name()),
        }
    }
}
