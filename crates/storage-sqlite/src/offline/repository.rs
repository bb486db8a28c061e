//! SQLite-backed cache store and sync queue.

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use std::sync::Arc;

use kolayfit_core::errors::Result;
use kolayfit_core::models::{CacheFilter, RecordPayload, SyncTable};
use kolayfit_core::sync::{ActionType, CacheStore, LocalMutation, OfflineStore, SyncAction, SyncQueue};

use crate::db::{create_pool, get_connection, DbPool, WriteHandle};
use crate::errors::StorageError;
use crate::schema::{foods, meal_logs, profiles, sync_actions, sync_sequence};

use super::model::{FoodDB, MealLogDB, ProfileDB, SyncActionDB};

fn enum_to_db<T: serde::Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?.trim_matches('"').to_string())
}

fn enum_from_db<T: serde::de::DeserializeOwned>(value: &str) -> Result<T> {
    Ok(serde_json::from_str(&format!("\"{}\"", value))?)
}

/// Synced/error flags of one cached row, for sync-indicator UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordSyncState {
    pub synced: bool,
    pub sync_error: bool,
}

fn upsert_record(conn: &mut SqliteConnection, record: &RecordPayload, synced: bool) -> Result<()> {
    match record {
        RecordPayload::MealLog(log) => {
            let row = MealLogDB::from_domain(log, synced)?;
            diesel::insert_into(meal_logs::table)
                .values(&row)
                .on_conflict(meal_logs::id)
                .do_update()
                .set(&row)
                .execute(conn)
                .map_err(StorageError::from)?;
        }
        RecordPayload::Food(food) => {
            let row = FoodDB::from_domain(food, synced);
            diesel::insert_into(foods::table)
                .values(&row)
                .on_conflict(foods::id)
                .do_update()
                .set(&row)
                .execute(conn)
                .map_err(StorageError::from)?;
        }
        RecordPayload::Profile(profile) => {
            let row = ProfileDB::from_domain(profile, synced);
            diesel::insert_into(profiles::table)
                .values(&row)
                .on_conflict(profiles::id)
                .do_update()
                .set(&row)
                .execute(conn)
                .map_err(StorageError::from)?;
        }
    }
    Ok(())
}

fn delete_record(conn: &mut SqliteConnection, table: SyncTable, id: &str) -> Result<()> {
    match table {
        SyncTable::MealLogs => {
            diesel::delete(meal_logs::table.find(id))
                .execute(conn)
                .map_err(StorageError::from)?;
        }
        SyncTable::Foods => {
            diesel::delete(foods::table.find(id))
                .execute(conn)
                .map_err(StorageError::from)?;
        }
        SyncTable::Profiles => {
            diesel::delete(profiles::table.find(id))
                .execute(conn)
                .map_err(StorageError::from)?;
        }
    }
    Ok(())
}

fn set_synced(conn: &mut SqliteConnection, table: SyncTable, id: &str) -> Result<()> {
    match table {
        SyncTable::MealLogs => {
            diesel::update(meal_logs::table.find(id))
                .set((meal_logs::synced.eq(1), meal_logs::sync_error.eq(0)))
                .execute(conn)
                .map_err(StorageError::from)?;
        }
        SyncTable::Foods => {
            diesel::update(foods::table.find(id))
                .set((foods::synced.eq(1), foods::sync_error.eq(0)))
                .execute(conn)
                .map_err(StorageError::from)?;
        }
        SyncTable::Profiles => {
            diesel::update(profiles::table.find(id))
                .set((profiles::synced.eq(1), profiles::sync_error.eq(0)))
                .execute(conn)
                .map_err(StorageError::from)?;
        }
    }
    Ok(())
}

fn set_sync_error(conn: &mut SqliteConnection, table: SyncTable, id: &str) -> Result<()> {
    match table {
        SyncTable::MealLogs => {
            diesel::update(meal_logs::table.find(id))
                .set(meal_logs::sync_error.eq(1))
                .execute(conn)
                .map_err(StorageError::from)?;
        }
        SyncTable::Foods => {
            diesel::update(foods::table.find(id))
                .set(foods::sync_error.eq(1))
                .execute(conn)
                .map_err(StorageError::from)?;
        }
        SyncTable::Profiles => {
            diesel::update(profiles::table.find(id))
                .set(profiles::sync_error.eq(1))
                .execute(conn)
                .map_err(StorageError::from)?;
        }
    }
    Ok(())
}

/// Appends one action to the log inside the caller's transaction. Sequence
/// ids come from the persistent `sync_sequence` high-water mark, bumped in
/// the same transaction, so they keep increasing after drained actions are
/// deleted; the single-writer actor makes the bump race-free and gap-free.
pub fn enqueue_action(conn: &mut SqliteConnection, mutation: &LocalMutation) -> Result<i64> {
    let next_seq = diesel::update(sync_sequence::table.find(1))
        .set(sync_sequence::last_sequence_id.eq(sync_sequence::last_sequence_id + 1))
        .returning(sync_sequence::last_sequence_id)
        .get_result::<i64>(conn)
        .map_err(StorageError::from)?;

    let row = SyncActionDB {
        sequence_id: next_seq,
        table_name: mutation.table().as_str().to_string(),
        action_type: enum_to_db(&mutation.action_type)?,
        payload: serde_json::to_string(&mutation.payload.to_json()?)?,
        created_at: Utc::now().to_rfc3339(),
    };
    diesel::insert_into(sync_actions::table)
        .values(&row)
        .execute(conn)
        .map_err(StorageError::from)?;

    Ok(next_seq)
}

fn to_sync_action(row: SyncActionDB) -> Result<SyncAction> {
    Ok(SyncAction {
        sequence_id: row.sequence_id,
        table: SyncTable::from_table_name(&row.table_name)?,
        action_type: enum_from_db(&row.action_type)?,
        payload: serde_json::from_str(&row.payload)?,
        created_at: row.created_at,
    })
}

pub struct SqliteOfflineStore {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl SqliteOfflineStore {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }

    /// Opens (or creates) the database at `database_url`, applies pending
    /// migrations, and spawns the writer.
    pub fn open(database_url: &str) -> Result<Self> {
        let pool = Arc::new(create_pool(database_url)?);
        let writer = WriteHandle::spawn(database_url)?;
        Ok(Self::new(pool, writer))
    }

    /// Synced/error flags of one cached row, if present.
    pub fn sync_state(&self, table: SyncTable, id: &str) -> Result<Option<RecordSyncState>> {
        let mut conn = get_connection(&self.pool)?;
        let flags = match table {
            SyncTable::MealLogs => meal_logs::table
                .find(id)
                .select((meal_logs::synced, meal_logs::sync_error))
                .first::<(i32, i32)>(&mut conn)
                .optional()
                .map_err(StorageError::from)?,
            SyncTable::Foods => foods::table
                .find(id)
                .select((foods::synced, foods::sync_error))
                .first::<(i32, i32)>(&mut conn)
                .optional()
                .map_err(StorageError::from)?,
            SyncTable::Profiles => profiles::table
                .find(id)
                .select((profiles::synced, profiles::sync_error))
                .first::<(i32, i32)>(&mut conn)
                .optional()
                .map_err(StorageError::from)?,
        };
        Ok(flags.map(|(synced, sync_error)| RecordSyncState {
            synced: synced != 0,
            sync_error: sync_error != 0,
        }))
    }
}

#[async_trait]
impl CacheStore for SqliteOfflineStore {
    fn get(&self, table: SyncTable, id: &str) -> Result<Option<RecordPayload>> {
        let mut conn = get_connection(&self.pool)?;
        match table {
            SyncTable::MealLogs => {
                let row = meal_logs::table
                    .find(id)
                    .first::<MealLogDB>(&mut conn)
                    .optional()
                    .map_err(StorageError::from)?;
                row.map(|r| r.into_domain().map(RecordPayload::MealLog))
                    .transpose()
            }
            SyncTable::Foods => {
                let row = foods::table
                    .find(id)
                    .first::<FoodDB>(&mut conn)
                    .optional()
                    .map_err(StorageError::from)?;
                Ok(row.map(|r| RecordPayload::Food(r.into())))
            }
            SyncTable::Profiles => {
                let row = profiles::table
                    .find(id)
                    .first::<ProfileDB>(&mut conn)
                    .optional()
                    .map_err(StorageError::from)?;
                Ok(row.map(|r| RecordPayload::Profile(r.into())))
            }
        }
    }

    fn query(&self, filter: &CacheFilter) -> Result<Vec<RecordPayload>> {
        let mut conn = get_connection(&self.pool)?;
        match filter {
            CacheFilter::All(SyncTable::MealLogs) => meal_logs::table
                .order(meal_logs::created_at.asc())
                .load::<MealLogDB>(&mut conn)
                .map_err(StorageError::from)?
                .into_iter()
                .map(|r| r.into_domain().map(RecordPayload::MealLog))
                .collect(),
            CacheFilter::All(SyncTable::Foods) => Ok(foods::table
                .limit(100)
                .load::<FoodDB>(&mut conn)
                .map_err(StorageError::from)?
                .into_iter()
                .map(|r| RecordPayload::Food(r.into()))
                .collect()),
            CacheFilter::All(SyncTable::Profiles) => Ok(profiles::table
                .load::<ProfileDB>(&mut conn)
                .map_err(StorageError::from)?
                .into_iter()
                .map(|r| RecordPayload::Profile(r.into()))
                .collect()),
            CacheFilter::FoodSearch { term } => {
                let pattern = format!("%{}%", term);
                Ok(foods::table
                    .filter(
                        foods::name
                            .like(pattern.clone())
                            .or(foods::name_en.like(pattern)),
                    )
                    .limit(20)
                    .load::<FoodDB>(&mut conn)
                    .map_err(StorageError::from)?
                    .into_iter()
                    .map(|r| RecordPayload::Food(r.into()))
                    .collect())
            }
            CacheFilter::MealLogsFor { user_id, date } => {
                let mut query = meal_logs::table
                    .filter(meal_logs::user_id.eq(user_id))
                    .into_boxed();
                if let Some(date) = date {
                    query = query.filter(meal_logs::date.eq(date));
                }
                query
                    .order(meal_logs::created_at.asc())
                    .load::<MealLogDB>(&mut conn)
                    .map_err(StorageError::from)?
                    .into_iter()
                    .map(|r| r.into_domain().map(RecordPayload::MealLog))
                    .collect()
            }
            CacheFilter::ProfileFor { user_id } => Ok(profiles::table
                .filter(profiles::user_id.eq(user_id))
                .load::<ProfileDB>(&mut conn)
                .map_err(StorageError::from)?
                .into_iter()
                .map(|r| RecordPayload::Profile(r.into()))
                .collect()),
        }
    }

    async fn put(&self, record: RecordPayload, synced: bool) -> Result<()> {
        record.validate()?;
        self.writer
            .exec(move |conn| upsert_record(conn, &record, synced))
            .await
    }

    async fn bulk_put(&self, records: Vec<RecordPayload>) -> Result<()> {
        for record in &records {
            record.validate()?;
        }
        self.writer
            .exec(move |conn| {
                for record in &records {
                    upsert_record(conn, record, true)?;
                }
                Ok(())
            })
            .await
    }

    async fn delete(&self, table: SyncTable, id: &str) -> Result<()> {
        let id = id.to_string();
        self.writer
            .exec(move |conn| delete_record(conn, table, &id))
            .await
    }

    async fn mark_synced(&self, table: SyncTable, id: &str) -> Result<()> {
        let id = id.to_string();
        self.writer
            .exec(move |conn| set_synced(conn, table, &id))
            .await
    }

    async fn flag_sync_error(&self, table: SyncTable, id: &str) -> Result<()> {
        let id = id.to_string();
        self.writer
            .exec(move |conn| set_sync_error(conn, table, &id))
            .await
    }

    async fn clear(&self) -> Result<()> {
        self.writer
            .exec(|conn| {
                diesel::delete(sync_actions::table)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                diesel::delete(meal_logs::table)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                diesel::delete(foods::table)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                diesel::delete(profiles::table)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }
}

#[async_trait]
impl SyncQueue for SqliteOfflineStore {
    async fn enqueue(&self, mutation: LocalMutation) -> Result<i64> {
        mutation.payload.validate()?;
        self.writer
            .exec(move |conn| enqueue_action(conn, &mutation))
            .await
    }

    fn peek_next(&self) -> Result<Option<SyncAction>> {
        let mut conn = get_connection(&self.pool)?;
        let row = sync_actions::table
            .order(sync_actions::sequence_id.asc())
            .first::<SyncActionDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        row.map(to_sync_action).transpose()
    }

    async fn remove(&self, sequence_id: i64) -> Result<()> {
        self.writer
            .exec(move |conn| {
                diesel::delete(sync_actions::table.find(sequence_id))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    fn list(&self) -> Result<Vec<SyncAction>> {
        let mut conn = get_connection(&self.pool)?;
        sync_actions::table
            .order(sync_actions::sequence_id.asc())
            .load::<SyncActionDB>(&mut conn)
            .map_err(StorageError::from)?
            .into_iter()
            .map(to_sync_action)
            .collect()
    }
}

#[async_trait]
impl OfflineStore for SqliteOfflineStore {
    async fn record_local_mutation(&self, mutation: LocalMutation) -> Result<i64> {
        mutation.payload.validate()?;
        self.writer
            .exec(move |conn| {
                match mutation.action_type {
                    ActionType::Delete => {
                        delete_record(conn, mutation.table(), mutation.payload.id())?;
                    }
                    ActionType::Insert | ActionType::Update => {
                        upsert_record(conn, &mutation.payload, false)?;
                    }
                }
                enqueue_action(conn, &mutation)
            })
            .await
    }
}
