use std::time::Duration;

use deadpool::Runtime;
use deadpool::managed::{self, Metrics, RecycleResult};
use hdbconnect_async::Connection;
use url::Url;

use crate::worker::{ConnectionInfo, SourceError};

pub type Pool = managed::Pool<ConnectionManager>;
pub type PooledConnection = managed::Object<ConnectionManager>;

#[derive(Debug)]
pub struct ConnectionManager {
    url: String,
}

impl ConnectionManager {
    pub const fn new(url: String) -> Self {
        Self { url }
    }
}

impl managed::Manager for ConnectionManager {
    type Type = Connection;
    type Error = hdbconnect::HdbError;

    async fn create(&self) -> Result<Connection, hdbconnect::HdbError> {
        Connection::new(self.url.clone()).await
    }

    async fn recycle(&self, _conn: &mut Connection, _: &Metrics) -> RecycleResult<Self::Error> {
        // Broken connections surface on the next query.
        Ok(())
    }
}

/// Connection URL with the credentials of `connection` embedded.
pub fn connection_url(connection: &ConnectionInfo) -> Result<String, SourceError> {
    let mut url = Url::parse(&connection.url)
        .map_err(|e| SourceError::Connection(format!("invalid URL: {e}")))?;

    url.set_username(&connection.user)
        .map_err(|()| SourceError::Connection("URL cannot carry credentials".into()))?;
    url.set_password(Some(&connection.password))
        .map_err(|()| SourceError::Connection("URL cannot carry credentials".into()))?;

    Ok(url.to_string())
}

/// Build a lazily connecting pool; no connection is opened until first use.
pub fn create_pool(url: String, max_size: usize) -> Result<Pool, SourceError> {
    Pool::builder(ConnectionManager::new(url))
        .max_size(max_size.max(1))
        .runtime(Runtime::Tokio1)
        .wait_timeout(Some(Duration::from_secs(10)))
        .create_timeout(Some(Duration::from_secs(30)))
        .recycle_timeout(Some(Duration::from_secs(5)))
        .build()
        .map_err(|e| SourceError::Connection(format!("failed to build pool: {e}")))
}
