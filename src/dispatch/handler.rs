//! Handler contract and invocation.
//!
//! A handler is any async function whose parameters all implement
//! [`Injectable`] and which returns `Result<(), RouteError>`. Parameters may
//! appear in any order and any combination:
//!
//! ```rust,ignore
//! async fn get_project(
//!     sink: ResponseSink,
//!     projects: Capability<dyn ProjectRepository>,
//!     request: InboundRequest,
//! ) -> Result<(), RouteError> { ... }
//! ```
//!
//! The parameter shapes are captured once when the route is registered
//! ([`HandlerDescriptor`]); at request time the [`HandlerInvoker`] resolves
//! arguments, calls the function and converts the outcome into a response.

use std::any::Any;
use std::future::Future;
use std::ops::Deref;
use std::pin::Pin;
use std::sync::Arc;

use axum::response::{IntoResponse, Response};
use http::StatusCode;
use tracing::{error, warn, Instrument};

use crate::error::{DispatchError, RouteError};

use super::context::{InboundRequest, RequestContext, ResponseSink};
use super::pool::ProviderPool;
use super::resolver::{resolve, Argument, RequestScope};
use super::shape::{ReservedShape, Shape};

/// Boxed future returned by an erased handler call.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<(), RouteError>> + Send>>;

// =============================================================================
// Injectable Parameters
// =============================================================================

/// A type that can appear as a handler parameter.
pub trait Injectable: Sized + Send + 'static {
    /// Declared shape of the parameter.
    fn shape() -> Shape;

    /// Convert a resolved argument. `None` means the argument does not match.
    fn from_argument(argument: Argument) -> Option<Self>;
}

impl Injectable for RequestContext {
    fn shape() -> Shape {
        Shape::Reserved(ReservedShape::Context)
    }

    fn from_argument(argument: Argument) -> Option<Self> {
        match argument {
            Argument::Context(ctx) => Some(ctx),
            _ => None,
        }
    }
}

impl Injectable for InboundRequest {
    fn shape() -> Shape {
        Shape::Reserved(ReservedShape::Request)
    }

    fn from_argument(argument: Argument) -> Option<Self> {
        match argument {
            Argument::Request(request) => Some(request),
            _ => None,
        }
    }
}

impl Injectable for ResponseSink {
    fn shape() -> Shape {
        Shape::Reserved(ReservedShape::ResponseSink)
    }

    fn from_argument(argument: Argument) -> Option<Self> {
        match argument {
            Argument::ResponseSink(sink) => Some(sink),
            _ => None,
        }
    }
}

/// A shared concrete singleton, registered with [`ProviderPool::provide`].
#[derive(Debug)]
pub struct Inject<T>(pub Arc<T>);

impl<T> Clone for Inject<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> Deref for Inject<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: Send + Sync + 'static> Injectable for Inject<T> {
    fn shape() -> Shape {
        Shape::shared::<T>()
    }

    fn from_argument(argument: Argument) -> Option<Self> {
        match argument {
            Argument::Provided(value) => value.downcast::<T>().ok().map(Inject),
            _ => None,
        }
    }
}

/// A by-value singleton, registered with [`ProviderPool::provide_value`].
/// Each handler call receives its own clone.
#[derive(Debug, Clone)]
pub struct Owned<T>(pub T);

impl<T> Deref for Owned<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: Clone + Send + Sync + 'static> Injectable for Owned<T> {
    fn shape() -> Shape {
        Shape::value::<T>()
    }

    fn from_argument(argument: Argument) -> Option<Self> {
        match argument {
            Argument::Provided(value) => value.downcast_ref::<T>().cloned().map(Owned),
            _ => None,
        }
    }
}

/// A service behind capability `I`, registered with
/// [`ProviderPool::provide_capability`].
pub struct Capability<I: ?Sized>(pub Arc<I>);

impl<I: ?Sized> Clone for Capability<I> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<I: ?Sized> Deref for Capability<I> {
    type Target = I;

    fn deref(&self) -> &I {
        &self.0
    }
}

impl<I: ?Sized + Send + Sync + 'static> Injectable for Capability<I> {
    fn shape() -> Shape {
        Shape::capability::<I>()
    }

    fn from_argument(argument: Argument) -> Option<Self> {
        match argument {
            Argument::Provided(value) => {
                let value: &(dyn Any + Send + Sync) = value.as_ref();
                value.downcast_ref::<Arc<I>>().cloned().map(Capability)
            }
            _ => None,
        }
    }
}

// =============================================================================
// Handler Trait
// =============================================================================

/// An async function callable with resolved arguments.
///
/// Implemented for functions of up to eight [`Injectable`] parameters.
pub trait Handler<Args>: Clone + Send + Sync + 'static {
    /// Shapes of the parameters, in declaration order.
    fn parameter_shapes() -> Vec<Shape>;

    /// Convert `arguments` and start the call.
    fn call(&self, arguments: Vec<Argument>) -> Result<HandlerFuture, DispatchError>;
}

macro_rules! impl_handler {
    ($($ty:ident),*) => {
        impl<F, Fut, $($ty,)*> Handler<($($ty,)*)> for F
        where
            F: Fn($($ty),*) -> Fut + Clone + Send + Sync + 'static,
            Fut: Future<Output = Result<(), RouteError>> + Send + 'static,
            $($ty: Injectable,)*
        {
            fn parameter_shapes() -> Vec<Shape> {
                vec![$($ty::shape()),*]
            }

            #[allow(non_snake_case, unused_mut, unused_variables)]
            fn call(&self, arguments: Vec<Argument>) -> Result<HandlerFuture, DispatchError> {
                let expected = <Self as Handler<($($ty,)*)>>::parameter_shapes().len();
                let actual = arguments.len();
                if expected != actual {
                    return Err(DispatchError::ArityMismatch { expected, actual });
                }

                let mut arguments = arguments.into_iter().enumerate();
                $(
                    let $ty = match arguments.next() {
                        Some((index, argument)) => $ty::from_argument(argument).ok_or_else(|| {
                            DispatchError::ArgumentMismatch { index, shape: $ty::shape() }
                        })?,
                        None => return Err(DispatchError::ArityMismatch { expected, actual }),
                    };
                )*

                let future: HandlerFuture = Box::pin((self)($($ty),*));
                Ok(future)
            }
        }
    };
}

impl_handler!();
impl_handler!(T1);
impl_handler!(T1, T2);
impl_handler!(T1, T2, T3);
impl_handler!(T1, T2, T3, T4);
impl_handler!(T1, T2, T3, T4, T5);
impl_handler!(T1, T2, T3, T4, T5, T6);
impl_handler!(T1, T2, T3, T4, T5, T6, T7);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8);

// =============================================================================
// Descriptor
// =============================================================================

/// Declared contract of a handler, captured at registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerDescriptor {
    name: &'static str,
    parameters: Vec<Shape>,
}

impl HandlerDescriptor {
    pub fn of<H, Args>() -> Self
    where
        H: Handler<Args>,
    {
        Self {
            name: std::any::type_name::<H>(),
            parameters: H::parameter_shapes(),
        }
    }

    /// Type name of the handler function.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn parameters(&self) -> &[Shape] {
        &self.parameters
    }

    /// Check that every parameter can be bound from `singletons` or the
    /// per-request values.
    pub fn check(&self, singletons: &ProviderPool) -> Result<(), DispatchError> {
        match self
            .parameters
            .iter()
            .position(|shape| !singletons.satisfies(shape))
        {
            Some(index) => Err(DispatchError::UnresolvedParameter {
                index,
                shape: self.parameters[index],
            }),
            None => Ok(()),
        }
    }
}

// =============================================================================
// Invoker
// =============================================================================

type ErasedHandler = dyn Fn(Vec<Argument>) -> Result<HandlerFuture, DispatchError> + Send + Sync;

/// Type-erased, cloneable handler ready for dispatch.
#[derive(Clone)]
pub struct HandlerInvoker {
    descriptor: Arc<HandlerDescriptor>,
    handler: Arc<ErasedHandler>,
}

impl HandlerInvoker {
    pub fn new<H, Args>(handler: H) -> Self
    where
        H: Handler<Args>,
        Args: 'static,
    {
        let descriptor = Arc::new(HandlerDescriptor::of::<H, Args>());
        let handler: Arc<ErasedHandler> =
            Arc::new(move |arguments| <H as Handler<Args>>::call(&handler, arguments));
        Self {
            descriptor,
            handler,
        }
    }

    pub fn descriptor(&self) -> &HandlerDescriptor {
        &self.descriptor
    }

    /// Run the handler for one request.
    ///
    /// On success the response is whatever the handler wrote to its sink.
    /// On failure the returned error is classified into the response and
    /// anything the handler wrote is discarded.
    pub async fn invoke(
        &self,
        singletons: &ProviderPool,
        context: RequestContext,
        request: InboundRequest,
    ) -> Response {
        let span = context.span().clone();
        let sink = ResponseSink::new();

        let outcome = self
            .run(singletons, context, request, sink.clone())
            .instrument(span.clone())
            .await;

        match outcome {
            Ok(()) => sink.into_response(),
            Err(RouteError::Dispatch(err)) => span.in_scope(|| {
                error!(
                    handler = self.descriptor.name(),
                    error = %err,
                    "Handler dispatch failed"
                );
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }),
            Err(err) => span.in_scope(|| {
                if sink.is_written() {
                    warn!(
                        handler = self.descriptor.name(),
                        discarded_status = ?sink.written_status(),
                        "Handler wrote a response before failing; discarding it"
                    );
                }
                err.into_response()
            }),
        }
    }

    async fn run(
        &self,
        singletons: &ProviderPool,
        context: RequestContext,
        request: InboundRequest,
        sink: ResponseSink,
    ) -> Result<(), RouteError> {
        let arguments = {
            let scope = RequestScope::new(singletons, context, request, sink);
            resolve(self.descriptor.parameters(), &scope)?
        };

        let future = (self.handler)(arguments)?;
        future.await
    }
}

impl std::fmt::Debug for HandlerInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerInvoker")
            .field("descriptor", &self.descriptor)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
