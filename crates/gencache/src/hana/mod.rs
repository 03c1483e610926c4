//! SAP HANA execution source
//!
//! Each connection identity gets a `deadpool` managed pool of
//! `hdbconnect_async` connections; queries run under a timeout and their
//! cells are converted to the tabular [`Value`](crate::worker::Value) model.

mod pool;
mod source;

pub use pool::{ConnectionManager, Pool, PooledConnection, connection_url, create_pool};
pub use source::{HanaSource, HanaSourceFactory, hdb_value_to_value};
