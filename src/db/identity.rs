//! User and device registration.
//!
//! A device ID is bound to one user the first time it registers and never
//! moves afterwards. Registration and status checks both refresh the
//! device's `last_seen_at`.

use super::{Database, now_ms};
use crate::error::{StoreError, StoreResult};
use crate::types::{Device, User, from_millis};
use rusqlite::{Connection, OptionalExtension, Row, params};
use uuid::Uuid;

/// Length of a hyphenated UUID string.
pub const DEVICE_ID_LEN: usize = 36;

/// True if `device_id` is a hyphenated UUID (`xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx`).
pub fn is_valid_device_id(device_id: &str) -> bool {
    device_id.len() == DEVICE_ID_LEN && Uuid::try_parse(device_id).is_ok()
}

fn parse_user_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get("id")?,
        created_at: from_millis(row.get("created_at")?),
        updated_at: from_millis(row.get("updated_at")?),
    })
}

fn parse_device_row(row: &Row) -> rusqlite::Result<Device> {
    Ok(Device {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        last_seen_at: from_millis(row.get("last_seen_at")?),
        created_at: from_millis(row.get("created_at")?),
        updated_at: from_millis(row.get("updated_at")?),
    })
}

fn get_device_internal(conn: &Connection, device_id: &str) -> StoreResult<Option<Device>> {
    let device = conn
        .query_row(
            "SELECT id, user_id, last_seen_at, created_at, updated_at
             FROM devices WHERE id = ?1 AND deleted_at IS NULL",
            params![device_id],
            parse_device_row,
        )
        .optional()?;
    Ok(device)
}

fn get_user_internal(conn: &Connection, user_id: &str) -> StoreResult<Option<User>> {
    let user = conn
        .query_row(
            "SELECT id, created_at, updated_at
             FROM users WHERE id = ?1 AND deleted_at IS NULL",
            params![user_id],
            parse_user_row,
        )
        .optional()?;
    Ok(user)
}

/// Pick the user a newly seen device is bound to.
///
/// One user per install: the earliest existing user is reused, and a user is
/// only minted when the store has none.
fn assign_user_for_new_device(conn: &Connection, now: i64) -> StoreResult<User> {
    let existing = conn
        .query_row(
            "SELECT id, created_at, updated_at
             FROM users WHERE deleted_at IS NULL
             ORDER BY created_at ASC, rowid ASC LIMIT 1",
            [],
            parse_user_row,
        )
        .optional()?;

    if let Some(user) = existing {
        return Ok(user);
    }

    let id = Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO users (id, created_at, updated_at) VALUES (?1, ?2, ?3)",
        params![&id, now, now],
    )?;
    tracing::info!(user_id = %id, "Created user");

    Ok(User {
        id,
        created_at: from_millis(now),
        updated_at: from_millis(now),
    })
}

/// Move `last_seen_at` forward to `now`, never backwards.
fn touch_device(conn: &Connection, device: &mut Device, now: i64) -> StoreResult<()> {
    let seen = now.max(device.last_seen_at.timestamp_millis());
    conn.execute(
        "UPDATE devices SET last_seen_at = ?1, updated_at = ?1 WHERE id = ?2",
        params![seen, &device.id],
    )?;
    device.last_seen_at = from_millis(seen);
    device.updated_at = from_millis(seen);
    Ok(())
}

impl Database {
    /// Register a device, creating it (and possibly a user) on first contact.
    ///
    /// Idempotent per device ID: a known device only has `last_seen_at`
    /// refreshed and keeps its owner.
    pub fn register_device(&self, device_id: &str) -> StoreResult<(Device, User)> {
        if !is_valid_device_id(device_id) {
            return Err(StoreError::InvalidInput(format!(
                "device id must be a hyphenated UUID, got {:?}",
                device_id
            )));
        }

        let now = now_ms();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let device = match get_device_internal(&tx, device_id)? {
                Some(mut device) => {
                    touch_device(&tx, &mut device, now)?;
                    tracing::debug!(device_id = %device.id, user_id = %device.user_id, "Device re-registered");
                    device
                }
                None => {
                    let user = assign_user_for_new_device(&tx, now)?;
                    tx.execute(
                        "INSERT INTO devices (id, user_id, last_seen_at, created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?3, ?3)",
                        params![device_id, &user.id, now],
                    )?;
                    tracing::info!(device_id = %device_id, user_id = %user.id, "Registered new device");
                    Device {
                        id: device_id.to_string(),
                        user_id: user.id,
                        last_seen_at: from_millis(now),
                        created_at: from_millis(now),
                        updated_at: from_millis(now),
                    }
                }
            };

            let user = get_user_internal(&tx, &device.user_id)?.ok_or_else(|| {
                StoreError::Storage(rusqlite::Error::QueryReturnedNoRows)
            })?;

            tx.commit()?;
            Ok((device, user))
        })
    }

    /// Look up a device and record the lookup as a heartbeat.
    pub fn get_device_status(&self, device_id: &str) -> StoreResult<Device> {
        let now = now_ms();

        self.with_conn(|conn| {
            let mut device = get_device_internal(conn, device_id)?
                .ok_or_else(|| StoreError::DeviceNotFound(device_id.to_string()))?;
            touch_device(conn, &mut device, now)?;
            Ok(device)
        })
    }
}
