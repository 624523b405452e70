//! SQLite connection management for the SQLite cache.
//!
//! File databases get WAL mode and a pool of up to 5 connections, with the
//! file and its parent directories created on demand.
//!
//! `:memory:` databases are private to the connection that opened them, so
//! they get a pool of exactly one connection that is never recycled. The
//! database then lives exactly as long as the pool.
//!
//! Every connection gets the `sqlite-vec` extension (the `vec0` virtual
//! table module), registered once per process as an auto extension.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::sync::Once;

static VEC_EXTENSION: Once = Once::new();

/// Make `vec0` available on every SQLite connection opened from now on.
pub fn register_vec_extension() {
    VEC_EXTENSION.call_once(|| {
        // SAFETY: `sqlite3_vec_init` is the extension entry point with the
        // signature SQLite expects; it is only passed to SQLite, never called
        // directly.
        unsafe {
            libsqlite3_sys::sqlite3_auto_extension(Some(std::mem::transmute::<
                *const (),
                unsafe extern "C" fn(
                    *mut libsqlite3_sys::sqlite3,
                    *mut *mut std::ffi::c_char,
                    *const libsqlite3_sys::sqlite3_api_routines,
                ) -> std::ffi::c_int,
            >(
                sqlite_vec::sqlite3_vec_init as *const ()
            )));
        }
    });
}

/// Filename that selects an in-memory database.
pub const MEMORY: &str = ":memory:";

/// Open a pool on `filename` (a path, or [`MEMORY`]).
pub async fn connect(filename: &str) -> Result<SqlitePool> {
    register_vec_extension();
    if filename == MEMORY {
        return connect_memory().await;
    }

    let db_path = Path::new(filename);
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create database directory: {}", parent.display())
            })?;
        }
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open database: {}", db_path.display()))?;

    Ok(pool)
}

async fn connect_memory() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .context("Failed to open in-memory database")?;

    Ok(pool)
}
