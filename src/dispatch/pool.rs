//! Singleton provider registry.
//!
//! Services are registered once at startup and never mutated afterwards, so
//! the pool is shared by reference across all in-flight requests without
//! locking.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use collab_server::dispatch::{ProviderPool, Shape};
//!
//! trait Clock: Send + Sync {}
//! struct SystemClock;
//! impl Clock for SystemClock {}
//!
//! struct Mailer;
//!
//! let mut pool = ProviderPool::new();
//! pool.provide(Arc::new(Mailer)).unwrap();
//! pool.provide_capability::<dyn Clock>(Arc::new(SystemClock)).unwrap();
//!
//! assert!(pool.satisfies(&Shape::shared::<Mailer>()));
//! assert!(pool.satisfies(&Shape::capability::<dyn Clock>()));
//! // A capability registration does not expose the concrete type.
//! assert!(!pool.satisfies(&Shape::shared::<SystemClock>()));
//! ```

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::DispatchError;

use super::shape::{ReservedShape, Shape};

/// A type-erased provider value.
pub type ProvidedValue = Arc<dyn Any + Send + Sync>;

#[derive(Clone)]
struct ProviderEntry {
    shape: Shape,
    value: ProvidedValue,
}

/// Ordered collection of singleton providers.
///
/// Each shape is provided at most once. Registration rejects shapes that
/// would shadow a per-request value and shapes that are already provided.
#[derive(Clone, Default)]
pub struct ProviderPool {
    entries: Vec<ProviderEntry>,
}

impl ProviderPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Provide a concrete service, injected as `Inject<T>`.
    pub fn provide<T: Send + Sync + 'static>(
        &mut self,
        service: Arc<T>,
    ) -> Result<(), DispatchError> {
        self.insert(Shape::shared::<T>(), service)
    }

    /// Provide a concrete value, injected by clone as `Owned<T>`.
    pub fn provide_value<T: Clone + Send + Sync + 'static>(
        &mut self,
        value: T,
    ) -> Result<(), DispatchError> {
        self.insert(Shape::value::<T>(), Arc::new(value))
    }

    /// Provide a service under capability `I`, injected as `Capability<I>`.
    ///
    /// The service is only reachable through `I`; its concrete type is not
    /// registered.
    pub fn provide_capability<I: ?Sized + Send + Sync + 'static>(
        &mut self,
        service: Arc<I>,
    ) -> Result<(), DispatchError> {
        self.insert(Shape::capability::<I>(), Arc::new(service))
    }

    fn insert(&mut self, shape: Shape, value: ProvidedValue) -> Result<(), DispatchError> {
        if let Some(reserved) = ReservedShape::for_key(shape.key()) {
            return Err(DispatchError::ReservedShape {
                shape: Shape::Reserved(reserved),
            });
        }

        if self.entries.iter().any(|entry| entry.shape == shape) {
            return Err(DispatchError::AmbiguousProvider { shape });
        }

        self.entries.push(ProviderEntry { shape, value });
        Ok(())
    }

    /// Find the provider whose shape matches exactly.
    pub fn find(&self, shape: &Shape) -> Option<&ProvidedValue> {
        self.entries
            .iter()
            .find(|entry| entry.shape == *shape)
            .map(|entry| &entry.value)
    }

    /// Whether a parameter of `shape` can be bound. Reserved shapes are
    /// always bindable since every request supplies them.
    pub fn satisfies(&self, shape: &Shape) -> bool {
        shape.is_reserved() || self.find(shape).is_some()
    }

    /// Registered shapes in registration order.
    pub fn shapes(&self) -> impl Iterator<Item = &Shape> {
        self.entries.iter().map(|entry| &entry.shape)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for ProviderPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|entry| entry.shape))
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
