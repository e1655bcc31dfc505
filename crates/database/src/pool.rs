use super::*;
use std::sync::Arc;
use std::sync::Mutex;
use tokio::sync::OwnedSemaphorePermit;
use tokio::sync::Semaphore;
use tokio_postgres::Client;

/// Bounded pool of dedicated PostgreSQL connections.
///
/// Every transaction checks out its own connection so that `BEGIN` and
/// `COMMIT` never interleave with statements from concurrent requests.
/// At most `size` connections are checked out at once; further callers
/// wait for a permit. Connections come back to the idle list only after
/// a clean `COMMIT` or `ROLLBACK`.
#[derive(Clone)]
pub struct Postgres {
    pool: Arc<Pool>,
}

pub(crate) struct Pool {
    url: String,
    size: usize,
    idle: Mutex<Vec<Client>>,
    permits: Arc<Semaphore>,
}

impl Postgres {
    pub fn new(url: impl Into<String>, size: usize) -> Self {
        Self {
            pool: Arc::new(Pool {
                url: url.into(),
                size,
                idle: Mutex::new(Vec::with_capacity(size)),
                permits: Arc::new(Semaphore::new(size.max(1))),
            }),
        }
    }
    /// Opens a transaction on a dedicated connection.
    pub async fn begin(&self) -> Result<Tx, DbError> {
        let permit = self.pool.permit().await?;
        let client = self.pool.checkout().await?;
        client.batch_execute("BEGIN").await?;
        log::trace!("transaction opened");
        Ok(Tx::new(client, permit, self.pool.clone()))
    }
    /// Round-trips a trivial query to prove the database is reachable.
    pub async fn ping(&self) -> Result<(), DbError> {
        let _permit = self.pool.permit().await?;
        let client = self.pool.checkout().await?;
        client.execute("SELECT 1", &[]).await?;
        self.pool.checkin(client);
        Ok(())
    }
    /// Creates the table and indices described by `S` if they are missing.
    pub async fn migrate<S: Schema>(&self) -> Result<(), DbError> {
        log::info!("migrating table ({})", S::name());
        let _permit = self.pool.permit().await?;
        let client = self.pool.checkout().await?;
        client.batch_execute(S::creates()).await?;
        client.batch_execute(S::indices()).await?;
        self.pool.checkin(client);
        Ok(())
    }
    /// Idle connections currently held by the pool.
    pub fn idle(&self) -> usize {
        self.pool.idle.lock().map(|idle| idle.len()).unwrap_or(0)
    }
    /// Connections that could be checked out right now without waiting.
    pub fn available(&self) -> usize {
        self.pool.permits.available_permits()
    }
}

impl Pool {
    async fn permit(&self) -> Result<OwnedSemaphorePermit, DbError> {
        self.permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| DbError::Closed)
    }
    pub(crate) async fn checkout(&self) -> Result<Client, PgErr> {
        let reused = self
            .idle
            .lock()
            .ok()
            .and_then(|mut idle| std::iter::from_fn(|| idle.pop()).find(|c| !c.is_closed()));
        match reused {
            Some(client) => Ok(client),
            None => self.connect().await,
        }
    }
    pub(crate) fn checkin(&self, client: Client) {
        if client.is_closed() {
            return;
        }
        if let Ok(mut idle) = self.idle.lock() {
            if idle.len() < self.size {
                idle.push(client);
            }
        }
    }
    async fn connect(&self) -> Result<Client, PgErr> {
        log::debug!("opening database connection");
        let (client, connection) = tokio_postgres::connect(&self.url, tokio_postgres::NoTls).await?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                log::error!("database connection closed with error: {}", e);
            }
        });
        client
            .execute("SET client_min_messages TO WARNING", &[])
            .await?;
        Ok(client)
    }
}
