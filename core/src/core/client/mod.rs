//! Store client with an explicit connection lifecycle.
//!
//! ```text
//! Disconnected ──connect──▶ Connecting ──ok──▶ Ready ◀──ok── Degraded
//!      ▲                        │               │  └──err──▶    │
//!      └─────────err────────────┘               └───close──▶ Closed ◀──close──┘
//! ```
//!
//! A failed store call moves Ready to Degraded; the next successful call
//! moves it back. `reconnect` reopens the database from Degraded or
//! Disconnected. Closed is terminal.

use crate::core::db::{Database, expiry_after};
use crate::core::db::error::DatabaseError;
use crate::core::kv::KvStore;
use crate::core::kv::error::StoreError;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Ready,
    Degraded,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Ready => write!(f, "ready"),
            ConnectionState::Degraded => write!(f, "degraded"),
            ConnectionState::Closed => write!(f, "closed"),
        }
    }
}

struct Connection {
    state: ConnectionState,
    db: Option<Arc<Database>>,
    last_error: Option<String>,
}

pub struct StoreClient {
    path: PathBuf,
    connection: RwLock<Connection>,
}

impl StoreClient {
    /// Creates a disconnected client for the database file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            connection: RwLock::new(Connection {
                state: ConnectionState::Disconnected,
                db: None,
                last_error: None,
            }),
        }
    }

    /// Creates a client and connects it.
    pub fn connect_to(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let client = Self::new(path);
        client.connect()?;
        Ok(client)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> ConnectionState {
        self.connection
            .read()
            .map(|connection| connection.state)
            .unwrap_or(ConnectionState::Closed)
    }

    /// Message of the failure that last degraded the connection.
    pub fn last_error(&self) -> Option<String> {
        self.connection
            .read()
            .ok()
            .and_then(|connection| connection.last_error.clone())
    }

    /// Opens the database. Connecting an open client is a no-op.
    pub fn connect(&self) -> Result<(), StoreError> {
        let mut connection = self.lock_write()?;

        match connection.state {
            ConnectionState::Ready | ConnectionState::Degraded => return Ok(()),
            ConnectionState::Closed => {
                return Err(StoreError::Unavailable("client is closed".to_string()));
            }
            ConnectionState::Disconnected | ConnectionState::Connecting => {}
        }

        self.open_into(&mut connection)
    }

    /// Drops the current handle and opens the database again.
    ///
    /// Fails while another caller still holds the previous handle mid-call;
    /// the connection then stays degraded.
    pub fn reconnect(&self) -> Result<(), StoreError> {
        let mut connection = self.lock_write()?;

        if connection.state == ConnectionState::Closed {
            return Err(StoreError::Unavailable("client is closed".to_string()));
        }

        let previous = connection.state;
        connection.db = None;

        match self.open_into(&mut connection) {
            Ok(()) => Ok(()),
            Err(error) => {
                if previous == ConnectionState::Degraded {
                    connection.state = ConnectionState::Degraded;
                }
                Err(error)
            }
        }
    }

    /// Releases the database. Every later call fails.
    pub fn close(&self) {
        if let Ok(mut connection) = self.connection.write() {
            connection.db = None;
            connection.state = ConnectionState::Closed;
        }
        info!(path = %self.path.display(), "store client closed");
    }

    fn open_into(&self, connection: &mut Connection) -> Result<(), StoreError> {
        connection.state = ConnectionState::Connecting;

        match Database::open(&self.path) {
            Ok(db) => {
                connection.db = Some(Arc::new(db));
                connection.state = ConnectionState::Ready;
                connection.last_error = None;
                info!(path = %self.path.display(), "store client ready");
                Ok(())
            }
            Err(error) => {
                connection.state = ConnectionState::Disconnected;
                connection.last_error = Some(error.to_string());
                warn!(path = %self.path.display(), %error, "store connection failed");
                Err(error.into())
            }
        }
    }

    fn lock_write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Connection>, StoreError> {
        self.connection
            .write()
            .map_err(|_| StoreError::Unavailable("connection state poisoned".to_string()))
    }

    /// Runs a call against the open database and records the outcome.
    fn call<T>(
        &self,
        op: impl FnOnce(&Database) -> Result<T, DatabaseError>,
    ) -> Result<T, StoreError> {
        let db = {
            let connection = self
                .connection
                .read()
                .map_err(|_| StoreError::Unavailable("connection state poisoned".to_string()))?;
            match (&connection.db, connection.state) {
                (Some(db), ConnectionState::Ready | ConnectionState::Degraded) => Arc::clone(db),
                (_, state) => {
                    return Err(StoreError::Unavailable(format!("client is {state}")));
                }
            }
        };

        match op(&db) {
            Ok(value) => {
                self.mark_healthy();
                Ok(value)
            }
            Err(error) => {
                self.mark_degraded(&error);
                Err(error.into())
            }
        }
    }

    fn mark_healthy(&self) {
        if self.state() != ConnectionState::Degraded {
            return;
        }
        if let Ok(mut connection) = self.connection.write()
            && connection.state == ConnectionState::Degraded
        {
            connection.state = ConnectionState::Ready;
            connection.last_error = None;
            info!(path = %self.path.display(), "store client recovered");
        }
    }

    fn mark_degraded(&self, error: &DatabaseError) {
        // A wrong-type call is a caller bug, not a store fault.
        if matches!(error, DatabaseError::WrongType(_)) {
            return;
        }
        if let Ok(mut connection) = self.connection.write() {
            if connection.state == ConnectionState::Ready {
                connection.state = ConnectionState::Degraded;
                warn!(path = %self.path.display(), %error, "store client degraded");
            }
            connection.last_error = Some(error.to_string());
        }
    }
}

impl KvStore for StoreClient {
    fn get(&self, key: &str, now: SystemTime) -> Result<Option<Vec<u8>>, StoreError> {
        self.call(|db| db.get(key, now))
    }

    fn set(&self, key: &str, value: &[u8], _now: SystemTime) -> Result<(), StoreError> {
        self.call(|db| db.put(key, value, None))
    }

    fn set_ex(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
        now: SystemTime,
    ) -> Result<(), StoreError> {
        self.call(|db| db.put(key, value, Some(expiry_after(now, ttl))))
    }

    fn delete(&self, key: &str, now: SystemTime) -> Result<bool, StoreError> {
        self.call(|db| db.delete(key, now))
    }

    fn exists(&self, key: &str, now: SystemTime) -> Result<bool, StoreError> {
        self.call(|db| db.exists(key, now))
    }

    fn sadd(&self, key: &str, member: &str, now: SystemTime) -> Result<bool, StoreError> {
        self.call(|db| db.sadd(key, member, now))
    }

    fn srem(&self, key: &str, member: &str, now: SystemTime) -> Result<bool, StoreError> {
        self.call(|db| db.srem(key, member, now))
    }

    fn smembers(&self, key: &str, now: SystemTime) -> Result<Vec<String>, StoreError> {
        self.call(|db| db.smembers(key, now))
    }

    fn expire(&self, key: &str, ttl: Duration, now: SystemTime) -> Result<bool, StoreError> {
        self.call(|db| db.expire(key, ttl, now))
    }

    fn expire_many(
        &self,
        keys: &[String],
        ttl: Duration,
        now: SystemTime,
    ) -> Result<Vec<bool>, StoreError> {
        self.call(|db| db.expire_many(keys, ttl, now))
    }

    fn purge_expired(&self, now: SystemTime) -> Result<Vec<String>, StoreError> {
        self.call(|db| db.purge_expired(now))
    }
}
