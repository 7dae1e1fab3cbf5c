//! Redis backend.

use redis::{Client, Connection};
use tracing::{debug, warn};

use crate::kv::{KvStore, WriteBatch, WriteOp};
use crate::{CacheError, StoreConfig};

/// [`KvStore`] backed by a Redis server.
///
/// The connection is opened lazily and discarded after a connectivity
/// failure, so the next call dials again.
pub struct RedisStore {
    client: Client,
    config: StoreConfig,
    conn: Option<Connection>,
    watching: bool,
}

impl RedisStore {
    /// Validate settings without dialing the server.
    pub fn open(config: &StoreConfig) -> Result<Self, CacheError> {
        let client = Client::open(config.connection_info()?)
            .map_err(|e| CacheError::NotConfigured(e.to_string()))?;
        Ok(Self {
            client,
            config: config.clone(),
            conn: None,
            watching: false,
        })
    }

    /// Open and verify the connection with a `PING`.
    pub fn connect(config: &StoreConfig) -> Result<Self, CacheError> {
        let mut store = Self::open(config)?;
        store.ping()?;
        Ok(store)
    }

    fn connection(&mut self) -> Result<&mut Connection, CacheError> {
        if self.conn.is_none() {
            let conn = self
                .client
                .get_connection_with_timeout(self.config.connect_timeout())?;
            conn.set_read_timeout(Some(self.config.io_timeout()))?;
            conn.set_write_timeout(Some(self.config.io_timeout()))?;
            debug!(host = ?self.config.host, port = ?self.config.port, "connected to cache store");
            self.conn = Some(conn);
        }
        match self.conn.as_mut() {
            Some(conn) => Ok(conn),
            None => Err(CacheError::Connection("no connection".to_string())),
        }
    }

    fn run<T, F>(&mut self, f: F) -> Result<T, CacheError>
    where
        F: FnOnce(&mut Connection) -> redis::RedisResult<T>,
    {
        let result = f(self.connection()?);
        result.map_err(|e| {
            let err = CacheError::from(e);
            if err.is_connectivity() {
                warn!(error = %err, "dropping cache store connection");
                self.conn = None;
                self.watching = false;
            }
            err
        })
    }
}

impl KvStore for RedisStore {
    fn ping(&mut self) -> Result<(), CacheError> {
        self.run(|conn| redis::cmd("PING").query::<String>(conn))
            .map(|_| ())
    }

    fn get(&mut self, key: &str) -> Result<Option<String>, CacheError> {
        self.run(|conn| redis::cmd("GET").arg(key).query(conn))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), CacheError> {
        self.run(|conn| redis::cmd("SET").arg(key).arg(value).query(conn))
    }

    fn delete(&mut self, keys: &[String]) -> Result<u64, CacheError> {
        if keys.is_empty() {
            return Ok(0);
        }
        self.run(|conn| redis::cmd("DEL").arg(keys).query(conn))
    }

    fn scan(
        &mut self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> Result<(u64, Vec<String>), CacheError> {
        self.run(|conn| {
            redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(count)
                .query(conn)
        })
    }

    fn execute(&mut self, batch: &WriteBatch) -> Result<(), CacheError> {
        if batch.is_empty() {
            return Ok(());
        }
        let pipe = transaction(batch);
        self.run(|conn| pipe.query::<()>(conn))
    }

    fn watch(&mut self, keys: &[String]) -> Result<(), CacheError> {
        if !keys.is_empty() {
            self.run(|conn| redis::cmd("WATCH").arg(keys).query::<()>(conn))?;
        }
        self.watching = true;
        Ok(())
    }

    fn unwatch(&mut self) -> Result<(), CacheError> {
        self.watching = false;
        if self.conn.is_none() {
            return Ok(());
        }
        self.run(|conn| redis::cmd("UNWATCH").query::<()>(conn))
    }

    fn execute_watched(&mut self, batch: &WriteBatch) -> Result<bool, CacheError> {
        // A redialed connection no longer carries the WATCH.
        if !self.watching {
            return Err(CacheError::Connection(
                "watched keys were lost with the connection".to_string(),
            ));
        }
        if batch.is_empty() {
            self.unwatch()?;
            return Ok(true);
        }
        self.watching = false;
        let pipe = transaction(batch);
        // EXEC answers nil when a watched key changed.
        let applied = self.run(|conn| pipe.query::<Option<()>>(conn))?;
        if applied.is_none() {
            debug!(ops = batch.len(), "watched transaction discarded");
        }
        Ok(applied.is_some())
    }
}

fn transaction(batch: &WriteBatch) -> redis::Pipeline {
    let mut pipe = redis::pipe();
    pipe.atomic();
    for op in batch.ops() {
        match op {
            WriteOp::Set { key, value } => {
                pipe.cmd("SET").arg(key).arg(value).ignore();
            }
            WriteOp::Delete { key } => {
                pipe.cmd("DEL").arg(key).ignore();
            }
        }
    }
    pipe
}
