//! Argument resolution.
//!
//! Given a handler's declared parameter shapes, the singleton pool and the
//! current request's values, produce one argument per parameter in order.
//! Resolution is pure: it performs no I/O and never binds partially.

use std::fmt;

use crate::error::DispatchError;

use super::context::{InboundRequest, RequestContext, ResponseSink};
use super::pool::{ProvidedValue, ProviderPool};
use super::shape::{ReservedShape, Shape};

/// A resolved handler argument.
#[derive(Clone)]
pub enum Argument {
    Context(RequestContext),
    Request(InboundRequest),
    ResponseSink(ResponseSink),
    /// A singleton from the provider pool
    Provided(ProvidedValue),
}

impl Argument {
    /// Whether this argument can bind a parameter of `shape`.
    ///
    /// Provided values are checked by variant only; the concrete type is
    /// checked when the handler downcasts it.
    #[cfg(test)]
    fn fits(&self, shape: &Shape) -> bool {
        matches!(
            (self, shape),
            (Argument::Context(_), Shape::Reserved(ReservedShape::Context))
                | (Argument::Request(_), Shape::Reserved(ReservedShape::Request))
                | (
                    Argument::ResponseSink(_),
                    Shape::Reserved(ReservedShape::ResponseSink)
                )
                | (Argument::Provided(_), Shape::Provided { .. })
        )
    }
}

impl fmt::Debug for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Context(ctx) => f.debug_tuple("Context").field(&ctx.request_id()).finish(),
            Argument::Request(req) => f.debug_tuple("Request").field(req.uri()).finish(),
            Argument::ResponseSink(_) => f.write_str("ResponseSink"),
            Argument::Provided(_) => f.write_str("Provided"),
        }
    }
}

/// Everything available to bind for one request.
pub struct RequestScope<'a> {
    singletons: &'a ProviderPool,
    context: RequestContext,
    request: InboundRequest,
    sink: ResponseSink,
}

impl<'a> RequestScope<'a> {
    pub fn new(
        singletons: &'a ProviderPool,
        context: RequestContext,
        request: InboundRequest,
        sink: ResponseSink,
    ) -> Self {
        Self {
            singletons,
            context,
            request,
            sink,
        }
    }

    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    pub fn sink(&self) -> &ResponseSink {
        &self.sink
    }

    fn bind(&self, shape: &Shape) -> Option<Argument> {
        match shape {
            Shape::Reserved(ReservedShape::Context) => Some(Argument::Context(self.context.clone())),
            Shape::Reserved(ReservedShape::Request) => Some(Argument::Request(self.request.clone())),
            Shape::Reserved(ReservedShape::ResponseSink) => {
                Some(Argument::ResponseSink(self.sink.clone()))
            }
            Shape::Provided { .. } => self.singletons.find(shape).cloned().map(Argument::Provided),
        }
    }
}

/// Resolve one argument per shape, in order.
///
/// Fails with [`DispatchError::UnresolvedParameter`] naming the first
/// parameter no value satisfies; in that case nothing is returned.
pub fn resolve(shapes: &[Shape], scope: &RequestScope<'_>) -> Result<Vec<Argument>, DispatchError> {
    shapes
        .iter()
        .enumerate()
        .map(|(index, shape)| {
            scope
                .bind(shape)
                .ok_or(DispatchError::UnresolvedParameter {
                    index,
                    shape: *shape,
                })
        })
        .collect()
}
