//! Concrete cache storage for the billing data plane.

pub mod sweeper;
pub mod ttl_cache;

pub use sweeper::Sweeper;
pub use ttl_cache::TtlCache;
