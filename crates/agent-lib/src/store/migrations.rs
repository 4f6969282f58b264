//! Schema versioning for the reading store
//!
//! Every schema step is written with `IF NOT EXISTS` so that running the
//! migrations against an already-initialized file is a no-op and never
//! touches existing rows.

use crate::error::{StoreError, StoreResult};
use rusqlite::{Connection, Transaction};

pub const CURRENT_SCHEMA_VERSION: i32 = 1;

pub(crate) fn run_migrations(conn: &mut Connection) -> StoreResult<()> {
    let mut version: i32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(StoreError::Schema)?;

    if version > CURRENT_SCHEMA_VERSION {
        return Err(StoreError::UnsupportedSchema {
            found: version,
            supported: CURRENT_SCHEMA_VERSION,
        });
    }

    if version == CURRENT_SCHEMA_VERSION {
        // The table can be dropped out from under a versioned file.
        conn.execute_batch(include_str!("schemas/schema_v1.sql"))
            .map_err(StoreError::Schema)?;
        return Ok(());
    }

    let tx = conn.transaction().map_err(StoreError::Schema)?;

    while version < CURRENT_SCHEMA_VERSION {
        let next_version = version + 1;
        apply_migration(&tx, next_version)?;
        version = next_version;
    }

    tx.pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION)
        .map_err(StoreError::Schema)?;
    tx.commit().map_err(StoreError::Schema)?;

    Ok(())
}

fn apply_migration(tx: &Transaction<'_>, version: i32) -> StoreResult<()> {
    match version {
        1 => tx
            .execute_batch(include_str!("schemas/schema_v1.sql"))
            .map_err(StoreError::Schema),
        other => Err(StoreError::UnsupportedSchema {
            found: other,
            supported: CURRENT_SCHEMA_VERSION,
        }),
    }
}
