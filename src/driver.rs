use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use std::future::Future;
use std::sync::Arc;

use crate::error::Result;

/// Capability set every managed resource provides
#[async_trait]
pub trait ManagedDriver: Send + Sync + 'static {
    /// Short resource-kind label used in logs and events
    fn kind(&self) -> &'static str;

    /// Whether the underlying resource is still usable
    fn is_open(&self) -> bool;

    /// Release the underlying resource
    async fn close(&self) -> Result<()>;
}

/// Lazily invoked constructor for a driver
pub type DriverFactory<D> = Box<dyn Fn() -> BoxFuture<'static, Result<Arc<D>>> + Send + Sync>;

/// Box an async closure as a [`DriverFactory`]
pub fn driver_factory<D, F, Fut>(factory: F) -> DriverFactory<D>
where
    D: ?Sized + Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Arc<D>>> + Send + 'static,
{
    Box::new(move || factory().boxed())
}
