//! Fallback resolver.
//!
//! # Responsibilities
//! - Substitute an alternative result when the composed invocation fails
//! - Gate the substitution on failure classification (`apply_on`/`skip_on`)
//!
//! # Design Decisions
//! - Handlers are either stateful objects implementing `FallbackHandler`
//!   (dependencies supplied at construction) or plain async closures via
//!   `fallback_fn`; no container lifecycle
//! - A failing fallback propagates unmodified; there is no recursive
//!   fallback

use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::classify::{classify, ErrorType, Fault, ANY_FAULT};
use crate::error::FaultError;

/// Alternative computation invoked with the original failure as context.
pub trait FallbackHandler<T, E>: Send + Sync {
    fn handle<'a>(&'a self, error: &'a FaultError<E>) -> BoxFuture<'a, Result<T, E>>;
}

/// Adapter turning an async closure into a [`FallbackHandler`].
pub struct FnFallback<F>(F);

impl<T, E, F, Fut> FallbackHandler<T, E> for FnFallback<F>
where
    F: Fn(&FaultError<E>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    fn handle<'a>(&'a self, error: &'a FaultError<E>) -> BoxFuture<'a, Result<T, E>> {
        Box::pin((self.0)(error))
    }
}

/// Wrap a plain async closure as a fallback handler.
pub fn fallback_fn<T, E, F, Fut>(f: F) -> FnFallback<F>
where
    F: Fn(&FaultError<E>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    FnFallback(f)
}

/// A handler plus its classification gates.
pub struct Fallback<T, E> {
    handler: Arc<dyn FallbackHandler<T, E>>,
    apply_on: Vec<&'static ErrorType>,
    skip_on: Vec<&'static ErrorType>,
}

impl<T, E> Clone for Fallback<T, E> {
    fn clone(&self) -> Self {
        Self {
            handler: self.handler.clone(),
            apply_on: self.apply_on.clone(),
            skip_on: self.skip_on.clone(),
        }
    }
}

impl<T, E: Fault> Fallback<T, E> {
    pub fn new(handler: impl FallbackHandler<T, E> + 'static) -> Self {
        Self {
            handler: Arc::new(handler),
            apply_on: vec![&ANY_FAULT],
            skip_on: Vec::new(),
        }
    }

    pub fn apply_on(mut self, types: Vec<&'static ErrorType>) -> Self {
        self.apply_on = types;
        self
    }

    pub fn skip_on(mut self, types: Vec<&'static ErrorType>) -> Self {
        self.skip_on = types;
        self
    }

    pub(crate) fn applies_to(&self, error: &FaultError<E>) -> bool {
        classify(error.fault_type(), &self.apply_on, &self.skip_on)
    }

    /// Substitute the failure, or propagate it when classification says no.
    pub(crate) async fn resolve(&self, error: FaultError<E>) -> Result<T, FaultError<E>> {
        if !self.applies_to(&error) {
            return Err(error);
        }
        tracing::debug!(fault = error.fault_type().name(), "applying fallback");
        self.handler
            .handle(&error)
            .await
            .map_err(FaultError::Execution)
    }
}
