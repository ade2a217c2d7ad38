// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Account table.

use redb::{ReadableDatabase, ReadableTable};

use super::keys::insert_new_key;
use super::{Database, StorageError, StorageResult, ACCOUNTS, ACCOUNT_KEYS};
use crate::accounts::Account;
use crate::keys::StoredKey;

impl Database {
    /// Insert an account together with its encrypted keys.
    ///
    /// Both land in the same write transaction, so an account is never
    /// visible without its keys.
    pub fn insert_account(&self, account: &Account, keys: &[StoredKey]) -> StorageResult<()> {
        let address = account.address.to_lowercase();
        let json = serde_json::to_vec(account)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut accounts = write_txn.open_table(ACCOUNTS)?;
            if accounts.get(address.as_str())?.is_some() {
                return Err(StorageError::AlreadyExists(format!("Account {address}")));
            }
            accounts.insert(address.as_str(), json.as_slice())?;

            let mut key_table = write_txn.open_table(ACCOUNT_KEYS)?;
            for key in keys {
                insert_new_key(&mut key_table, &address, key)?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Look up an account by address.
    pub fn get_account(&self, address: &str) -> StorageResult<Account> {
        let address = address.to_lowercase();
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ACCOUNTS)?;
        match table.get(address.as_str())? {
            Some(value) => Ok(serde_json::from_slice(value.value())?),
            None => Err(StorageError::NotFound(format!("Account {address}"))),
        }
    }

    /// List all accounts, oldest first.
    pub fn list_accounts(&self) -> StorageResult<Vec<Account>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ACCOUNTS)?;

        let mut accounts = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            accounts.push(serde_json::from_slice::<Account>(value.value())?);
        }
        accounts.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(accounts)
    }
}
