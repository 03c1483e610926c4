//! Generation-vector query result cache
//!
//! Cached query results are addressed by [`keys::GenerationalKey`]s whose
//! storage key changes whenever any dependency they were built from is
//! bumped. Mutations on the analytics metamodel flow through an
//! [`invalidation::InvalidationMapper`] that bumps the affected generations;
//! [`worker::WorkerPool`] executes queries and writes the encoded results,
//! bounded per database target by a [`gate::ConnectionGate`].

pub mod config;
mod error;
pub mod gate;
pub mod hana;
pub mod invalidation;
pub mod keys;
pub mod observability;
pub mod store;
pub mod worker;

pub use config::{Config, ConfigBuilder, TelemetryConfig, load_config, load_config_from_path};
pub use error::{Error, Result};
pub use gate::{ConnectionGate, GateConfig, GateError, GatePermit};
pub use invalidation::{InvalidationMapper, MutationBus, MutationEvent};
pub use keys::{GenerationalKey, KeySynthesizer};
pub use store::{CacheStore, StoreError, create_store};
pub use worker::{FetchError, TtlPolicy, WorkerPool};
