// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Encrypted key table with least-recently-used selection.

use chrono::{Duration, Utc};
use redb::{ReadableTable, Table};

use super::{Database, StorageError, StorageResult, ACCOUNT_KEYS};
use crate::keys::{KeyStore, StoredKey};

/// Build the composite key `lowercase_address|zero_padded_index`.
///
/// Zero padding keeps an address's keys ordered by index in range scans.
fn make_key(address: &str, index: u32) -> String {
    format!("{}|{:010}", address.to_lowercase(), index)
}

/// Half-open range covering every key of `address`.
///
/// `}` is the byte after `|`, so it bounds all `address|...` entries.
fn address_range(address: &str) -> (String, String) {
    let addr = address.to_lowercase();
    (format!("{addr}|"), format!("{addr}}}"))
}

pub(super) fn insert_new_key(
    table: &mut Table<'_, &'static str, &'static [u8]>,
    address: &str,
    key: &StoredKey,
) -> StorageResult<()> {
    let id = make_key(address, key.index);
    if table.get(id.as_str())?.is_some() {
        return Err(StorageError::AlreadyExists(format!(
            "Key {} of account {address}",
            key.index
        )));
    }
    let json = serde_json::to_vec(key)?;
    table.insert(id.as_str(), json.as_slice())?;
    Ok(())
}

impl KeyStore for Database {
    fn least_recently_used_key(&self, address: &str) -> StorageResult<StoredKey> {
        let (start, end) = address_range(address);

        // Selection and the "mark used" update share one write transaction;
        // redb serializes writers, so concurrent selections cannot both see
        // the same key as the oldest.
        let write_txn = self.db.begin_write()?;
        let selected = {
            let mut table = write_txn.open_table(ACCOUNT_KEYS)?;

            let mut keys = Vec::new();
            for entry in table.range(start.as_str()..end.as_str())? {
                let (id, value) = entry?;
                let key: StoredKey = serde_json::from_slice(value.value())?;
                keys.push((id.value().to_string(), key));
            }

            let newest = keys.iter().map(|(_, k)| k.last_used_at).max();
            let (id, mut selected) = keys
                .into_iter()
                .min_by(|(_, a), (_, b)| {
                    a.last_used_at
                        .cmp(&b.last_used_at)
                        .then(a.index.cmp(&b.index))
                })
                .ok_or_else(|| StorageError::NotFound(address.to_string()))?;

            // Strictly newer than every other key, even within one clock tick.
            let now = Utc::now();
            selected.last_used_at = match newest {
                Some(newest) if newest >= now => newest + Duration::nanoseconds(1),
                _ => now,
            };

            let json = serde_json::to_vec(&selected)?;
            table.insert(id.as_str(), json.as_slice())?;
            selected
        };
        write_txn.commit()?;

        Ok(selected)
    }

    fn save_key(&self, address: &str, key: &StoredKey) -> StorageResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(ACCOUNT_KEYS)?;
            insert_new_key(&mut table, address, key)?;
        }
        write_txn.commit()?;
        Ok(())
    }
}
