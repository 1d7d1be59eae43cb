//! JSON key-value records on top of the `kv` table.
//!
//! List-valued keys (`nodes`, `instances`, `<user>_instances`, `audits`) are
//! only ever modified through [`update`], [`list_push`] or [`list_remove`],
//! which run the read-modify-write inside a single `BEGIN IMMEDIATE`
//! transaction. Two concurrent writers therefore serialize on the database
//! lock instead of overwriting each other's list.

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior};
use serde::{de::DeserializeOwned, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// Read a key, `None` if it has never been written.
pub fn get<T: DeserializeOwned>(conn: &Connection, key: &str) -> Result<Option<T>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value FROM kv WHERE key = ?1",
            rusqlite::params![key],
            |row| row.get(0),
        )
        .optional()
        .with_context(|| format!("Failed to read key {}", key))?;

    raw.map(|value| {
        serde_json::from_str(&value).with_context(|| format!("Corrupt value under key {}", key))
    })
    .transpose()
}

/// Read a list key, treating an absent key as the empty list.
pub fn get_list<T: DeserializeOwned>(conn: &Connection, key: &str) -> Result<Vec<T>> {
    Ok(get(conn, key)?.unwrap_or_default())
}

pub fn set<T: Serialize + ?Sized>(conn: &Connection, key: &str, value: &T) -> Result<()> {
    let value = serde_json::to_string(value)
        .with_context(|| format!("Failed to serialize value for key {}", key))?;

    conn.execute(
        "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        rusqlite::params![key, value, now()],
    )
    .with_context(|| format!("Failed to write key {}", key))?;

    Ok(())
}

/// Delete a key. Returns whether it existed.
pub fn delete(conn: &Connection, key: &str) -> Result<bool> {
    let rows = conn
        .execute("DELETE FROM kv WHERE key = ?1", rusqlite::params![key])
        .with_context(|| format!("Failed to delete key {}", key))?;

    Ok(rows > 0)
}

/// Run `f` inside an immediate (write-locking) transaction.
pub fn transaction<T, F>(conn: &mut Connection, f: F) -> Result<T>
where
    F: FnOnce(&Transaction<'_>) -> Result<T>,
{
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .context("Failed to begin transaction")?;
    let out = f(&tx)?;
    tx.commit().context("Failed to commit transaction")?;
    Ok(out)
}

/// Atomically read, modify and write back a key.
pub fn update<T, R, F>(conn: &mut Connection, key: &str, f: F) -> Result<R>
where
    T: Serialize + DeserializeOwned + Default,
    F: FnOnce(&mut T) -> R,
{
    transaction(conn, |tx| {
        let mut value: T = get(tx, key)?.unwrap_or_default();
        let out = f(&mut value);
        set(tx, key, &value)?;
        Ok(out)
    })
}

/// Atomically append an item to a list key.
pub fn list_push<T>(conn: &mut Connection, key: &str, item: T) -> Result<()>
where
    T: Serialize + DeserializeOwned,
{
    update(conn, key, |list: &mut Vec<T>| list.push(item))
}

/// Atomically drop every item matching `pred` from a list key and return
/// the removed items in their original order.
pub fn list_remove<T, P>(conn: &mut Connection, key: &str, mut pred: P) -> Result<Vec<T>>
where
    T: Serialize + DeserializeOwned,
    P: FnMut(&T) -> bool,
{
    update(conn, key, |list: &mut Vec<T>| {
        let (removed, kept): (Vec<T>, Vec<T>) =
            std::mem::take(list).into_iter().partition(|item| pred(item));
        *list = kept;
        removed
    })
}
