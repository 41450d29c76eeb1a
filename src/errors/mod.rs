//! # Error Handling
//!
//! Error handling for the Switchyard control plane. Transient errors (source,
//! discovery, write conflicts) are retried by their owning loop; validation and
//! invariant errors are surfaced to the caller of a translation cycle.

pub mod types;

pub use types::{Result, SwitchyardError};
