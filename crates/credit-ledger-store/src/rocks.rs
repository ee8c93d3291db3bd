//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MultiThreaded, Options, WriteBatch,
};

use credit_ledger_core::{
    CreditBalance, CreditPackage, CreditTransaction, MessageCost, SubscriptionTier,
    TransactionId, UserId,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::locks::UserLocks;
use crate::schema::{all_column_families, cf};
use crate::{Decision, LedgerWrite, OperationKey, Store};

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    locks: UserLocks,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(StoreError::database)?;

        Ok(Self {
            db: Arc::new(db),
            locks: UserLocks::new(),
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf).map_err(StoreError::serialization)?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(StoreError::serialization)
    }

    fn get_value<T: serde::de::DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        self.db
            .get_cf(&cf, key)
            .map_err(StoreError::database)?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn put_value<T: serde::Serialize>(&self, cf_name: &str, key: &[u8], value: &T) -> Result<()> {
        let cf = self.cf(cf_name)?;
        let value = Self::serialize(value)?;
        self.db
            .put_cf(&cf, key, value)
            .map_err(StoreError::database)
    }

    fn list_values<T: serde::de::DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        self.db
            .iterator_cf(&cf, IteratorMode::Start)
            .map(|item| {
                let (_, value) = item.map_err(StoreError::database)?;
                Self::deserialize(&value)
            })
            .collect()
    }

    /// Walk a user's index newest first, yielding entries until `keep` says stop.
    fn scan_user_transactions(
        &self,
        user_id: &UserId,
        mut keep: impl FnMut(usize, &CreditTransaction) -> ScanStep,
    ) -> Result<Vec<CreditTransaction>> {
        let cf_by_user = self.cf(cf::TRANSACTIONS_BY_USER)?;
        let prefix = keys::user_prefix(user_id);
        let upper = keys::user_transaction_key(user_id, u64::MAX);

        let iter = self.db.iterator_cf(
            &cf_by_user,
            IteratorMode::From(&upper, Direction::Reverse),
        );

        let mut transactions = Vec::new();
        for (position, item) in iter.enumerate() {
            let (key, value) = item.map_err(StoreError::database)?;
            if !key.starts_with(&prefix) {
                break;
            }

            let tx_id = keys::transaction_id_from_value(&value).ok_or_else(|| {
                StoreError::Serialization("corrupt transaction index entry".into())
            })?;
            let Some(tx) = self.get_transaction(&tx_id)? else {
                tracing::warn!(transaction_id = %tx_id, "Index points at missing transaction");
                continue;
            };

            match keep(position, &tx) {
                ScanStep::Skip => {}
                ScanStep::Take => transactions.push(tx),
                ScanStep::Stop => break,
            }
        }

        Ok(transactions)
    }

    /// Stage a ledger write into a batch.
    fn stage_write(
        &self,
        batch: &mut WriteBatch,
        write: &LedgerWrite,
        operation: Option<&OperationKey>,
    ) -> Result<()> {
        let cf_balances = self.cf(cf::BALANCES)?;
        let cf_tx = self.cf(cf::TRANSACTIONS)?;
        let cf_tx_by_user = self.cf(cf::TRANSACTIONS_BY_USER)?;

        let user_id = &write.balance.user_id;
        batch.put_cf(
            &cf_balances,
            keys::balance_key(user_id),
            Self::serialize(&write.balance)?,
        );

        for entry in &write.entries {
            batch.put_cf(
                &cf_tx,
                keys::transaction_key(&entry.id),
                Self::serialize(entry)?,
            );
            batch.put_cf(
                &cf_tx_by_user,
                keys::user_transaction_key(user_id, entry.sequence),
                entry.id.to_bytes(),
            );
        }

        if let (Some(operation), Some(last)) = (operation, write.last_entry()) {
            let cf_ops = self.cf(cf::OPERATIONS)?;
            batch.put_cf(&cf_ops, keys::operation_key(operation), last.id.to_bytes());
        }

        Ok(())
    }
}

enum ScanStep {
    Skip,
    Take,
    Stop,
}

impl Store for RocksStore {
    // =========================================================================
    // Balance Operations
    // =========================================================================

    fn get_balance(&self, user_id: &UserId) -> Result<Option<CreditBalance>> {
        self.get_value(cf::BALANCES, &keys::balance_key(user_id))
    }

    fn get_or_create_balance(&self, seed: &LedgerWrite) -> Result<CreditBalance> {
        let _guard = self.locks.lock(&seed.balance.user_id);

        if let Some(existing) = self.get_balance(&seed.balance.user_id)? {
            return Ok(existing);
        }

        let mut batch = WriteBatch::default();
        self.stage_write(&mut batch, seed, None)?;
        self.db.write(batch).map_err(StoreError::database)?;

        Ok(seed.balance.clone())
    }

    fn transact(
        &self,
        user_id: &UserId,
        operation: Option<&OperationKey>,
        decide: &mut dyn FnMut(&CreditBalance) -> Decision,
    ) -> Result<Option<LedgerWrite>> {
        let _guard = self.locks.lock(user_id);

        if let Some(operation) = operation {
            if let Some(transaction_id) = self.find_operation(operation)? {
                return Err(StoreError::DuplicateOperation {
                    source_id: operation.source_id.clone(),
                    transaction_id,
                });
            }
        }

        let current = self
            .get_balance(user_id)?
            .ok_or_else(|| StoreError::NotFound {
                entity: "balance",
                id: user_id.to_string(),
            })?;

        let write = match decide(&current) {
            Decision::Abort => return Ok(None),
            Decision::Commit(write) => write,
        };

        // Write atomically
        let mut batch = WriteBatch::default();
        self.stage_write(&mut batch, &write, operation)?;
        self.db.write(batch).map_err(StoreError::database)?;

        Ok(Some(write))
    }

    fn set_subscription_tier(
        &self,
        user_id: &UserId,
        tier_id: Option<&str>,
    ) -> Result<CreditBalance> {
        let _guard = self.locks.lock(user_id);

        let mut balance = self
            .get_balance(user_id)?
            .ok_or_else(|| StoreError::NotFound {
                entity: "balance",
                id: user_id.to_string(),
            })?;
        balance.subscription_tier_id = tier_id.map(str::to_string);
        balance.updated_at = Utc::now();

        self.put_value(cf::BALANCES, &keys::balance_key(user_id), &balance)?;
        Ok(balance)
    }

    // =========================================================================
    // Transaction Log
    // =========================================================================

    fn get_transaction(&self, transaction_id: &TransactionId) -> Result<Option<CreditTransaction>> {
        self.get_value(cf::TRANSACTIONS, &keys::transaction_key(transaction_id))
    }

    fn list_transactions(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CreditTransaction>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        self.scan_user_transactions(user_id, |position, _| {
            if position < offset {
                ScanStep::Skip
            } else if position < offset.saturating_add(limit) {
                ScanStep::Take
            } else {
                ScanStep::Stop
            }
        })
    }

    fn list_transactions_since(
        &self,
        user_id: &UserId,
        since: DateTime<Utc>,
    ) -> Result<Vec<CreditTransaction>> {
        // Timestamps are taken under the user's write guard, so they never
        // decrease along the sequence.
        self.scan_user_transactions(user_id, |_, tx| {
            if tx.created_at >= since {
                ScanStep::Take
            } else {
                ScanStep::Stop
            }
        })
    }

    fn find_operation(&self, operation: &OperationKey) -> Result<Option<TransactionId>> {
        let cf = self.cf(cf::OPERATIONS)?;
        let value = self
            .db
            .get_cf(&cf, keys::operation_key(operation))
            .map_err(StoreError::database)?;

        value
            .map(|bytes| {
                keys::transaction_id_from_value(&bytes)
                    .ok_or_else(|| StoreError::Serialization("corrupt operation record".into()))
            })
            .transpose()
    }

    // =========================================================================
    // Message Costs
    // =========================================================================

    fn put_message_cost(&self, cost: &MessageCost) -> Result<()> {
        let _guard = self.locks.lock(&cost.user_id);

        let cf_costs = self.cf(cf::MESSAGE_COSTS)?;
        let cf_ids = self.cf(cf::MESSAGE_IDS)?;
        let id_key = keys::message_id_key(&cost.message_id);

        let exists = self
            .db
            .get_cf(&cf_ids, &id_key)
            .map_err(StoreError::database)?
            .is_some();
        if exists {
            return Err(StoreError::DuplicateMessage {
                message_id: cost.message_id.clone(),
            });
        }

        let mut batch = WriteBatch::default();
        batch.put_cf(
            &cf_costs,
            keys::message_cost_key(&cost.user_id, cost.created_at, &cost.message_id),
            Self::serialize(cost)?,
        );
        batch.put_cf(&cf_ids, &id_key, b"");

        self.db.write(batch).map_err(StoreError::database)
    }

    fn list_message_costs_since(
        &self,
        user_id: &UserId,
        since: DateTime<Utc>,
    ) -> Result<Vec<MessageCost>> {
        let cf = self.cf(cf::MESSAGE_COSTS)?;
        let prefix = keys::user_prefix(user_id);
        let lower = keys::message_cost_lower_bound(user_id, since);

        let mut costs = Vec::new();
        for item in self
            .db
            .iterator_cf(&cf, IteratorMode::From(&lower, Direction::Forward))
        {
            let (key, value) = item.map_err(StoreError::database)?;
            if !key.starts_with(&prefix) {
                break;
            }
            costs.push(Self::deserialize(&value)?);
        }

        Ok(costs)
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    fn put_tier(&self, tier: &SubscriptionTier) -> Result<()> {
        self.put_value(cf::TIERS, &keys::catalog_key(&tier.id), tier)
    }

    fn get_tier(&self, tier_id: &str) -> Result<Option<SubscriptionTier>> {
        self.get_value(cf::TIERS, &keys::catalog_key(tier_id))
    }

    fn list_tiers(&self) -> Result<Vec<SubscriptionTier>> {
        self.list_values(cf::TIERS)
    }

    fn put_package(&self, package: &CreditPackage) -> Result<()> {
        self.put_value(cf::PACKAGES, &keys::catalog_key(&package.id), package)
    }

    fn list_packages(&self) -> Result<Vec<CreditPackage>> {
        self.list_values(cf::PACKAGES)
    }
}
