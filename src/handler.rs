/*
 *   Copyright (c) 2022 R3BL LLC
 *   All rights reserved.
 *
 *   Licensed under the Apache License, Version 2.0 (the "License");
 *   you may not use this file except in compliance with the License.
 *   You may obtain a copy of the License at
 *
 *   http://www.apache.org/licenses/LICENSE-2.0
 *
 *   Unless required by applicable law or agreed to in writing, software
 *   distributed under the License is distributed on an "AS IS" BASIS,
 *   WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *   See the License for the specific language governing permissions and
 *   limitations under the License.
 */

//! Handler subscription. A channel's handlers are an ordered list of
//! trait objects, the same shape as an `AsyncSubscriber` list on a store:
//! a new subscription on the same id replaces the previous list rather
//! than appending to it.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use crate::types::{HandlerOutcome, Payload};

/// A consumer bound to a channel id. Implemented directly for closures via
/// [`FnHandler`]; implement it on a struct when a handler needs to own
/// state across invocations.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, payload: Payload) -> HandlerOutcome;
}

pub type SharedHandler = Arc<dyn Handler>;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Adapts an async closure into a [`Handler`].
pub struct FnHandler<F> {
    f: F,
}

impl<F, Fut> FnHandler<F>
where
    F: Fn(Payload) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerOutcome> + Send + 'static,
{
    pub fn new(f: F) -> Self { Self { f } }
}

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(Payload) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerOutcome> + Send + 'static,
{
    async fn handle(&self, payload: Payload) -> HandlerOutcome {
        (self.f)(payload).await
    }
}

/// Wraps a boxed-future-returning closure directly, for call sites that
/// already have a type-erased future on hand.
pub struct BoxedFnHandler {
    f: Arc<dyn Fn(Payload) -> BoxFuture<'static, HandlerOutcome> + Send + Sync>,
}

impl BoxedFnHandler {
    pub fn new(f: impl Fn(Payload) -> BoxFuture<'static, HandlerOutcome> + Send + Sync + 'static) -> Self {
        Self { f: Arc::new(f) }
    }
}

#[async_trait]
impl Handler for BoxedFnHandler {
    async fn handle(&self, payload: Payload) -> HandlerOutcome {
        (self.f)(payload).await
    }
}
