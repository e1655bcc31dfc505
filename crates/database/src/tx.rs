use super::*;
use std::sync::Arc;
use tokio::sync::OwnedSemaphorePermit;
use tokio_postgres::Client;

/// An open transaction that owns one pooled connection.
///
/// Statements run through [`Deref`](std::ops::Deref) to the client.
/// The connection returns to the pool only through [`Tx::commit`] or
/// [`Tx::rollback`]. A guard dropped while still holding its connection
/// (panic, early return, cancelled future) closes that connection, and
/// the server aborts whatever the transaction had written. The pool
/// permit is released when the guard goes away.
pub struct Tx {
    client: Option<Client>,
    pool: Arc<Pool>,
    _permit: OwnedSemaphorePermit,
}

impl Tx {
    pub(crate) fn new(client: Client, permit: OwnedSemaphorePermit, pool: Arc<Pool>) -> Self {
        Self {
            client: Some(client),
            pool,
            _permit: permit,
        }
    }
    pub async fn commit(mut self) -> Result<(), PgErr> {
        self.finish("COMMIT").await
    }
    pub async fn rollback(mut self) -> Result<(), PgErr> {
        self.finish("ROLLBACK").await
    }
    async fn finish(&mut self, statement: &str) -> Result<(), PgErr> {
        // released before the await so an error path drops the connection
        let client = self.client.take();
        if let Some(client) = client {
            client.batch_execute(statement).await?;
            log::trace!("transaction closed ({})", statement);
            self.pool.checkin(client);
        }
        Ok(())
    }
}

impl std::ops::Deref for Tx {
    type Target = Client;
    fn deref(&self) -> &Client {
        // only empty inside finish, which consumes the guard
        self.client.as_ref().unwrap_or_else(|| unreachable!("transaction already closed"))
    }
}

impl Drop for Tx {
    fn drop(&mut self) {
        if self.client.take().is_some() {
            log::warn!("transaction dropped while open; discarding its connection");
        }
    }
}
