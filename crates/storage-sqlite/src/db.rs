//! Connection pool, embedded migrations, and the single-writer actor.
//!
//! Reads go straight to the r2d2 pool. All mutations are funneled through
//! one `WriteHandle`: a dedicated thread owning its own connection, running
//! each job inside a transaction. This keeps the engine single-writer even
//! when the host is multi-threaded.

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tokio::sync::{mpsc, oneshot};

use kolayfit_core::errors::{DatabaseError, Error, Result};

use crate::errors::StorageError;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;
pub type DbConnection = PooledConnection<ConnectionManager<SqliteConnection>>;

const CONNECTION_PRAGMAS: &str =
    "PRAGMA journal_mode = WAL; PRAGMA busy_timeout = 5000; PRAGMA foreign_keys = ON;";

#[derive(Debug)]
struct ConnectionOptions;

impl diesel::r2d2::CustomizeConnection<SqliteConnection, diesel::r2d2::Error>
    for ConnectionOptions
{
    fn on_acquire(
        &self,
        conn: &mut SqliteConnection,
    ) -> std::result::Result<(), diesel::r2d2::Error> {
        conn.batch_execute(CONNECTION_PRAGMAS)
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

/// Builds the read pool and applies pending migrations.
pub fn create_pool(database_url: &str) -> Result<DbPool> {
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    let pool = Pool::builder()
        .max_size(8)
        .connection_customizer(Box::new(ConnectionOptions))
        .build(manager)
        .map_err(|e| Error::Database(DatabaseError::Pool(e.to_string())))?;

    let mut conn = get_connection(&pool)?;
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| Error::Database(DatabaseError::Migration(e.to_string())))?;
    if !applied.is_empty() {
        log::info!("[Storage] Applied {} migration(s)", applied.len());
    }

    Ok(pool)
}

pub fn get_connection(pool: &DbPool) -> Result<DbConnection> {
    pool.get()
        .map_err(|e| Error::Database(DatabaseError::Pool(e.to_string())))
}

type WriteJob = Box<dyn FnOnce(&mut SqliteConnection) + Send + 'static>;

/// Handle to the writer thread. Cheap to clone; all clones feed the same
/// serialized queue of write jobs.
#[derive(Debug, Clone)]
pub struct WriteHandle {
    tx: mpsc::UnboundedSender<WriteJob>,
}

impl WriteHandle {
    pub fn spawn(database_url: &str) -> Result<Self> {
        let mut conn = SqliteConnection::establish(database_url)
            .map_err(|e| Error::Database(DatabaseError::Pool(e.to_string())))?;
        conn.batch_execute(CONNECTION_PRAGMAS)
            .map_err(StorageError::from)?;

        let (tx, mut rx) = mpsc::unbounded_channel::<WriteJob>();
        std::thread::Builder::new()
            .name("sqlite-writer".to_string())
            .spawn(move || {
                while let Some(job) = rx.blocking_recv() {
                    job(&mut conn);
                }
            })
            .map_err(|e| {
                Error::Database(DatabaseError::Internal(format!(
                    "Failed to spawn writer thread: {}",
                    e
                )))
            })?;

        Ok(Self { tx })
    }

    /// Runs `job` on the writer connection inside a transaction and awaits
    /// its result.
    pub async fn exec<T, F>(&self, job: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Box::new(move |conn| {
                let result = run_in_transaction(conn, job);
                let _ = reply_tx.send(result);
            }))
            .map_err(|_| {
                Error::Database(DatabaseError::Internal(
                    "Writer thread is no longer running".to_string(),
                ))
            })?;

        reply_rx.await.map_err(|_| {
            Error::Database(DatabaseError::Internal(
                "Writer thread dropped the reply".to_string(),
            ))
        })?
    }
}

enum TxError {
    App(Error),
    Db(diesel::result::Error),
}

impl From<diesel::result::Error> for TxError {
    fn from(err: diesel::result::Error) -> Self {
        TxError::Db(err)
    }
}

fn run_in_transaction<T, F>(conn: &mut SqliteConnection, job: F) -> Result<T>
where
    F: FnOnce(&mut SqliteConnection) -> Result<T>,
{
    conn.transaction::<T, TxError, _>(|conn| job(conn).map_err(TxError::App))
        .map_err(|err| match err {
            TxError::App(err) => err,
            TxError::Db(err) => StorageError::from(err).into(),
        })
}
