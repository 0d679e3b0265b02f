//! In-memory cache of rendered images
//!
//! Keys are canonical request fingerprints, values are immutable encoded
//! payloads. Capacity is counted in entries and the least recently used entry
//! is evicted first. Concurrent misses for one key are coalesced through
//! [`single_flight`].

pub mod service;
pub mod single_flight;

pub use service::{CacheLookup, CacheStats, RenderCache};
pub use single_flight::SingleFlight;
