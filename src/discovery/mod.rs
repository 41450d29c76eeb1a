//! # Discovery
//!
//! Background pollers keeping an auxiliary property of a domain resource in
//! sync with an external service. Writes go through a compare-and-swap
//! [`ResourceStore`](crate::sources::ResourceStore), so a concurrent edit
//! makes the attempt fail and retry instead of clobbering the other writer.

pub mod backoff;
pub mod functions;
pub mod poller;

pub use backoff::Backoff;
pub use functions::{
    function_poller, install_functions, FunctionDiscovery, FunctionFetcher,
    HttpFunctionFetcher, StaticFunctionFetcher,
};
pub use poller::{DiscoveryPoller, DiscoverySource, Mutator};
