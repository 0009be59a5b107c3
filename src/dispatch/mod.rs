//! Request dispatch with shape-based argument injection.
//!
//! Handlers are plain async functions. Each parameter declares a [`Shape`]:
//! either one of the per-request values ([`RequestContext`],
//! [`InboundRequest`], [`ResponseSink`]) or a singleton service taken from
//! the [`ProviderPool`]. At request time the resolver binds one argument per
//! parameter and the [`HandlerInvoker`] runs the handler, converting any
//! returned error into a response.
//!
//! Singletons come in three flavours:
//!
//! | Parameter            | Registered with                      | Delivered as  |
//! |----------------------|--------------------------------------|---------------|
//! | [`Inject<T>`]        | [`ProviderPool::provide`]            | `Arc<T>`      |
//! | [`Owned<T>`]         | [`ProviderPool::provide_value`]      | clone of `T`  |
//! | [`Capability<dyn I>`]| [`ProviderPool::provide_capability`] | `Arc<dyn I>`  |

mod context;
mod handler;
mod pool;
mod resolver;
mod shape;

pub use context::{cookie_value, InboundRequest, PathParams, RequestContext, ResponseSink};
pub use handler::{
    Capability, Handler, HandlerDescriptor, HandlerFuture, HandlerInvoker, Inject, Injectable,
    Owned,
};
pub use pool::{ProvidedValue, ProviderPool};
pub use resolver::{resolve, Argument, RequestScope};
pub use shape::{Binding, ProviderKey, ProviderKind, ReservedShape, Shape};
