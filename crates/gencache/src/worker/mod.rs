//! Query workers
//!
//! A [`QueryWorker`] runs SQL against a backing database through a
//! [`SqlSource`], encodes the result as an Arrow IPC payload and writes it
//! to the cache store under a generational key with a [`TtlPolicy`].
//! Connections are bounded per target by the shared
//! [`ConnectionGate`](crate::gate::ConnectionGate).

mod config;
mod error;
mod payload;
mod pool;
mod query;
mod registry;
mod source;
mod ttl;

pub use config::{
    DEFAULT_CONNECTION_POOL_SIZE, DEFAULT_QUERY_TIMEOUT, DEFAULT_ROW_LIMIT, DEFAULT_TTL,
    DEFAULT_WORKERS, MAX_ROW_LIMIT, WorkerConfig,
};
pub use error::{FetchError, PayloadError, PayloadResult, SourceError};
pub use payload::{decode_payload, encode_payload};
pub use pool::WorkerPool;
pub use query::QueryWorker;
pub use registry::SourceRegistry;
pub use source::{Column, ColumnType, ConnectionInfo, RowSet, SourceFactory, SqlSource, Value};
pub use ttl::{InvalidTtl, NO_EXPIRATION, TtlPolicy, WORKER_DEFAULT};
