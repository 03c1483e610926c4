//! Generational cache keys
//!
//! A [`GenerationalKey`] captures the generations of everything a cached
//! computation depends on. The [`KeySynthesizer`] compares that snapshot
//! against the current generation counters in the cache store and mints a
//! new key version whenever any dependency has been bumped, so stale cache
//! entries become unreachable and expire through their TTL.

mod config;
mod generational;
mod synthesizer;

pub use config::KeyConfig;
pub use generational::{DepGen, GenerationalKey};
pub use synthesizer::KeySynthesizer;
