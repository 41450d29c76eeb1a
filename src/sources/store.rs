//! Storage boundary for optimistic, read-modify-write mutation.

use async_trait::async_trait;

use crate::domain::{Resource, ResourceRef};
use crate::errors::Result;

/// A store offering compare-and-swap writes keyed on `resource_version`.
///
/// Callers read, mutate, and write back the copy they read. The write succeeds
/// only if nobody else wrote in between; otherwise it fails with
/// [`SwitchyardError::Conflict`](crate::errors::SwitchyardError::Conflict) and
/// the caller starts over from a fresh read.
#[async_trait]
pub trait ResourceStore<R: Resource>: Send + Sync {
    /// Current stored copy, `None` if absent.
    async fn read(&self, id: &ResourceRef) -> Result<Option<R>>;

    /// Write `resource` if the stored version still equals
    /// `resource.metadata().resource_version`. A version of 0 creates.
    /// Returns the stored copy carrying its new version.
    async fn write(&self, resource: R) -> Result<R>;
}
