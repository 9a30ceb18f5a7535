//! Handler abstraction for performers and reactions.

use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use super::ActionSystem;
use crate::action::Action;

/// Outcome of a single handler invocation.
///
/// Errors are logged by the dispatcher and never abort sibling handlers.
pub type HandlerResult = anyhow::Result<()>;

pub(crate) type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Callback registered against an action kind, either as the kind's
/// performer or as a pre/post reaction.
///
/// Handlers may suspend for as long as they need (waiting on a timer, another
/// task, an animation collaborator). The dispatcher awaits each one before
/// moving on. Use the provided [`ActionSystem`] to queue follow-up reactions
/// with [`ActionSystem::add_reaction`].
#[async_trait]
pub trait Handler<A: Action>: Send + Sync + 'static {
    /// Name used in logs and events.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    async fn handle(&self, action: Arc<A>, actions: &ActionSystem) -> HandlerResult;
}

/// Adapter turning a closure into a [`Handler`]. See [`handler_fn`].
pub struct FnHandler<A, F> {
    f: F,
    name: &'static str,
    _kind: PhantomData<fn(Arc<A>)>,
}

/// Wraps a closure returning a future as a [`Handler`].
///
/// The closure receives an owned clone of the dispatcher handle, so the
/// returned future can be `'static`:
///
/// ```ignore
/// actions.attach_performer(handler_fn(|hit: Arc<DealDamage>, actions| async move {
///     actions.add_reaction(Flinch { target: hit.target })?;
///     Ok(())
/// }));
/// ```
pub fn handler_fn<A, F, Fut>(f: F) -> FnHandler<A, F>
where
    A: Action,
    F: Fn(Arc<A>, ActionSystem) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    FnHandler {
        f,
        name: "handler_fn",
        _kind: PhantomData,
    }
}

impl<A, F> FnHandler<A, F> {
    /// Overrides the name reported in logs and events.
    pub fn named(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }
}

#[async_trait]
impl<A, F, Fut> Handler<A> for FnHandler<A, F>
where
    A: Action,
    F: Fn(Arc<A>, ActionSystem) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    async fn handle(&self, action: Arc<A>, actions: &ActionSystem) -> HandlerResult {
        (self.f)(action, actions.clone()).await
    }
}

/// Type-erased handler stored in the registry.
pub(crate) type ErasedHandler =
    Arc<dyn Fn(Arc<dyn Action>, ActionSystem) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

pub(crate) fn erase<A, H>(handler: H) -> ErasedHandler
where
    A: Action,
    H: Handler<A>,
{
    let handler = Arc::new(handler);
    Arc::new(move |action: Arc<dyn Action>, actions: ActionSystem| {
        let handler = Arc::clone(&handler);
        Box::pin(async move {
            let name = action.name();
            match action.downcast_arc::<A>() {
                Some(action) => handler.handle(action, &actions).await,
                None => Err(anyhow::anyhow!(
                    "handler {} received mismatched action {}",
                    handler.name(),
                    name
                )),
            }
        }) as BoxFuture<'static, HandlerResult>
    })
}
