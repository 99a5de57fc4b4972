//! Hand-rolled FIFO connection pool over tokio-postgres.
//!
//! Two pools are created at startup (read and write). `acquire` hands out a
//! [`Connection`] that returns its client to the pool on drop; an exhausted
//! pool answers `None` and the caller maps that to `ServerIsBusy`.

use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Error};
use log::{error, info};
use tokio::task::JoinSet;
use tokio_postgres::{Client, NoTls};

pub(crate) struct Pool(Arc<Shared>);

struct Shared {
    /// pool name, for logs only
    name: &'static str,
    /// connections in the pool, accessed in a FIFO manner
    connections: Mutex<VecDeque<Client>>,
}

impl Clone for Pool {
    fn clone(&self) -> Pool {
        Pool(self.0.clone())
    }
}

impl Pool {
    const DEFAULT_SIZE: usize = 10;

    pub fn new(name: &'static str) -> Self {
        Self(Arc::new(Shared {
            name,
            connections: Mutex::new(VecDeque::with_capacity(Self::DEFAULT_SIZE)),
        }))
    }

    /// open DEFAULT_SIZE connections concurrently and keep whatever succeeds;
    /// a pool that could not open a single connection is a startup failure
    pub async fn init(&self, conn_str: &str) -> Result<(), Error> {
        let mut set = JoinSet::new();
        for _ in 0..Self::DEFAULT_SIZE {
            let conn_str = conn_str.to_string();
            set.spawn(async move { connect(conn_str.as_str()).await });
        }
        let mut opened: VecDeque<Client> = VecDeque::with_capacity(Self::DEFAULT_SIZE);
        while let Some(res) = set.join_next().await {
            match res {
                Ok(Ok(client)) => {
                    info!("connection created for pool {}", self.0.name);
                    opened.push_back(client);
                }
                Ok(Err(e)) => error!("pool {} failed to connect, {}", self.0.name, e),
                Err(e) => error!("join_next failed when joining, {}", e),
            }
        }
        if opened.is_empty() {
            bail!("no connection could be opened for pool {}", self.0.name);
        }
        match self.0.connections.lock() {
            Ok(mut connections) => connections.append(&mut opened),
            Err(_) => bail!("pool {} lock poisoned during init", self.0.name),
        }
        Ok(())
    }

    /// pop the oldest idle connection; `None` means the pool is exhausted
    pub fn acquire(&self) -> Option<Connection> {
        let mut connections = self.0.connections.lock().ok()?;
        connections.pop_front().map(|client| Connection {
            client: Some(client),
            pool: self.clone(),
        })
    }

    fn release(&self, client: Client) {
        if let Ok(mut connections) = self.0.connections.lock() {
            connections.push_back(client);
        }
    }
}

async fn connect(conn_str: &str) -> Result<Client, tokio_postgres::Error> {
    let (client, conn) = tokio_postgres::connect(conn_str, NoTls).await?;
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            error!("connection returned error and aborted, {}", e);
        }
    });
    Ok(client)
}

/// A pooled client; derefs to [`Client`] and releases itself on drop.
pub(crate) struct Connection {
    client: Option<Client>,
    pool: Pool,
}

impl Deref for Connection {
    type Target = Client;

    fn deref(&self) -> &Client {
        // present from construction until drop
        self.client.as_ref().expect("connection already released")
    }
}

impl DerefMut for Connection {
    fn deref_mut(&mut self) -> &mut Client {
        self.client.as_mut().expect("connection already released")
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            self.pool.release(client);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_on_empty_pool_returns_none() {
        let pool = Pool::new("read");
        assert!(pool.acquire().is_none());
    }
}
