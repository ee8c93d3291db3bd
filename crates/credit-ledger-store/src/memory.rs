//! In-memory storage implementation.
//!
//! Keeps the same atomicity contract as the `RocksDB` backend: the per-user
//! guard is held across read, decide and commit.

use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use credit_ledger_core::{
    CreditBalance, CreditPackage, CreditTransaction, MessageCost, SubscriptionTier,
    TransactionId, UserId,
};

use crate::error::{Result, StoreError};
use crate::locks::UserLocks;
use crate::{Decision, LedgerWrite, OperationKey, Store};

#[derive(Default)]
struct MemoryState {
    balances: HashMap<UserId, CreditBalance>,
    transactions: HashMap<TransactionId, CreditTransaction>,
    // Per user, in sequence order.
    by_user: HashMap<UserId, Vec<TransactionId>>,
    operations: HashMap<OperationKey, TransactionId>,
    message_costs: HashMap<UserId, Vec<MessageCost>>,
    message_ids: HashSet<String>,
    tiers: HashMap<String, SubscriptionTier>,
    packages: HashMap<String, CreditPackage>,
}

impl MemoryState {
    fn commit(&mut self, write: &LedgerWrite, operation: Option<&OperationKey>) {
        let user_id = write.balance.user_id;
        let index = self.by_user.entry(user_id).or_default();
        for entry in &write.entries {
            index.push(entry.id);
            self.transactions.insert(entry.id, entry.clone());
        }
        if let (Some(operation), Some(last)) = (operation, write.last_entry()) {
            self.operations.insert(operation.clone(), last.id);
        }
        self.balances.insert(user_id, write.balance.clone());
    }
}

/// Memory-backed storage implementation.
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    locks: UserLocks,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            locks: UserLocks::new(),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryState>> {
        self.state
            .read()
            .map_err(|_| StoreError::Database("memory store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryState>> {
        self.state
            .write()
            .map_err(|_| StoreError::Database("memory store lock poisoned".into()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for MemoryStore {
    fn get_balance(&self, user_id: &UserId) -> Result<Option<CreditBalance>> {
        Ok(self.read()?.balances.get(user_id).cloned())
    }

    fn get_or_create_balance(&self, seed: &LedgerWrite) -> Result<CreditBalance> {
        let _guard = self.locks.lock(&seed.balance.user_id);
        let mut state = self.write()?;

        if let Some(existing) = state.balances.get(&seed.balance.user_id) {
            return Ok(existing.clone());
        }

        state.commit(seed, None);
        Ok(seed.balance.clone())
    }

    fn transact(
        &self,
        user_id: &UserId,
        operation: Option<&OperationKey>,
        decide: &mut dyn FnMut(&CreditBalance) -> Decision,
    ) -> Result<Option<LedgerWrite>> {
        let _guard = self.locks.lock(user_id);

        let current = {
            let state = self.read()?;
            if let Some(operation) = operation {
                if let Some(transaction_id) = state.operations.get(operation) {
                    return Err(StoreError::DuplicateOperation {
                        source_id: operation.source_id.clone(),
                        transaction_id: *transaction_id,
                    });
                }
            }
            state
                .balances
                .get(user_id)
                .cloned()
                .ok_or_else(|| StoreError::NotFound {
                    entity: "balance",
                    id: user_id.to_string(),
                })?
        };

        match decide(&current) {
            Decision::Abort => Ok(None),
            Decision::Commit(write) => {
                self.write()?.commit(&write, operation);
                Ok(Some(write))
            }
        }
    }

    fn set_subscription_tier(
        &self,
        user_id: &UserId,
        tier_id: Option<&str>,
    ) -> Result<CreditBalance> {
        let _guard = self.locks.lock(user_id);
        let mut state = self.write()?;

        let balance = state
            .balances
            .get_mut(user_id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "balance",
                id: user_id.to_string(),
            })?;
        balance.subscription_tier_id = tier_id.map(str::to_string);
        balance.updated_at = Utc::now();
        Ok(balance.clone())
    }

    fn get_transaction(&self, transaction_id: &TransactionId) -> Result<Option<CreditTransaction>> {
        Ok(self.read()?.transactions.get(transaction_id).cloned())
    }

    fn list_transactions(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CreditTransaction>> {
        let state = self.read()?;
        let Some(index) = state.by_user.get(user_id) else {
            return Ok(Vec::new());
        };

        Ok(index
            .iter()
            .rev()
            .skip(offset)
            .take(limit)
            .filter_map(|id| state.transactions.get(id).cloned())
            .collect())
    }

    fn list_transactions_since(
        &self,
        user_id: &UserId,
        since: DateTime<Utc>,
    ) -> Result<Vec<CreditTransaction>> {
        let state = self.read()?;
        let Some(index) = state.by_user.get(user_id) else {
            return Ok(Vec::new());
        };

        Ok(index
            .iter()
            .rev()
            .filter_map(|id| state.transactions.get(id))
            .filter(|tx| tx.created_at >= since)
            .cloned()
            .collect())
    }

    fn find_operation(&self, operation: &OperationKey) -> Result<Option<TransactionId>> {
        Ok(self.read()?.operations.get(operation).copied())
    }

    fn put_message_cost(&self, cost: &MessageCost) -> Result<()> {
        let _guard = self.locks.lock(&cost.user_id);
        let mut state = self.write()?;

        if !state.message_ids.insert(cost.message_id.clone()) {
            return Err(StoreError::DuplicateMessage {
                message_id: cost.message_id.clone(),
            });
        }
        state
            .message_costs
            .entry(cost.user_id)
            .or_default()
            .push(cost.clone());
        Ok(())
    }

    fn list_message_costs_since(
        &self,
        user_id: &UserId,
        since: DateTime<Utc>,
    ) -> Result<Vec<MessageCost>> {
        let state = self.read()?;
        let mut costs: Vec<MessageCost> = state
            .message_costs
            .get(user_id)
            .into_iter()
            .flatten()
            .filter(|cost| cost.created_at >= since)
            .cloned()
            .collect();
        costs.sort_by_key(|cost| cost.created_at);
        Ok(costs)
    }

    fn put_tier(&self, tier: &SubscriptionTier) -> Result<()> {
        self.write()?.tiers.insert(tier.id.clone(), tier.clone());
        Ok(())
    }

    fn get_tier(&self, tier_id: &str) -> Result<Option<SubscriptionTier>> {
        Ok(self.read()?.tiers.get(tier_id).cloned())
    }

    fn list_tiers(&self) -> Result<Vec<SubscriptionTier>> {
        Ok(self.read()?.tiers.values().cloned().collect())
    }

    fn put_package(&self, package: &CreditPackage) -> Result<()> {
        self.write()?
            .packages
            .insert(package.id.clone(), package.clone());
        Ok(())
    }

    fn list_packages(&self) -> Result<Vec<CreditPackage>> {
        Ok(self.read()?.packages.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use credit_ledger_core::{SourceType, TransactionSource, TransactionType};

    fn seed(store: &MemoryStore, user_id: UserId, amount: i64) -> CreditBalance {
        let now = Utc::now();
        let mut write = LedgerWrite::new(CreditBalance::empty(user_id, None, now));
        let entry = CreditTransaction::record(
            &write.balance,
            TransactionType::Granted,
            amount,
            TransactionSource::new(SourceType::Migration),
            now,
        );
        write.push(entry);
        store.get_or_create_balance(&write).unwrap()
    }

    fn spend_write(balance: &CreditBalance, amount: i64, source_id: &str) -> LedgerWrite {
        let mut write = LedgerWrite::new(balance.clone());
        let entry = CreditTransaction::record(
            balance,
            TransactionType::Spent,
            -amount,
            TransactionSource::new(SourceType::Usage).with_source_id(Some(source_id.into())),
            Utc::now(),
        );
        write.push(entry);
        write
    }

    #[test]
    fn create_is_insert_if_absent() {
        let store = MemoryStore::new();
        let user_id = UserId::generate();

        let first = seed(&store, user_id, 10);
        let second = seed(&store, user_id, 999);

        assert_eq!(first.current_balance, 10);
        assert_eq!(second.current_balance, 10);
        assert_eq!(store.list_transactions(&user_id, 10, 0).unwrap().len(), 1);
    }

    #[test]
    fn transact_commits_and_rejects_duplicates() {
        let store = MemoryStore::new();
        let user_id = UserId::generate();
        seed(&store, user_id, 10);
        let op = OperationKey::new(user_id, SourceType::Usage, "msg-1");

        let committed = store
            .transact(&user_id, Some(&op), &mut |current: &CreditBalance| {
                Decision::Commit(spend_write(current, 3, "msg-1"))
            })
            .unwrap()
            .unwrap();
        assert_eq!(committed.balance.current_balance, 7);
        assert_eq!(
            store.find_operation(&op).unwrap(),
            Some(committed.entries[0].id)
        );

        let retry = store.transact(&user_id, Some(&op), &mut |current: &CreditBalance| {
            Decision::Commit(spend_write(current, 3, "msg-1"))
        });
        assert!(matches!(retry, Err(StoreError::DuplicateOperation { .. })));
        assert_eq!(
            store.get_balance(&user_id).unwrap().unwrap().current_balance,
            7
        );
    }

    #[test]
    fn abort_leaves_ledger_untouched() {
        let store = MemoryStore::new();
        let user_id = UserId::generate();
        seed(&store, user_id, 10);

        let outcome = store
            .transact(&user_id, None, &mut |_: &CreditBalance| Decision::Abort)
            .unwrap();
        assert!(outcome.is_none());
        assert_eq!(store.list_transactions(&user_id, 10, 0).unwrap().len(), 1);
    }

    #[test]
    fn transact_without_balance_is_not_found() {
        let store = MemoryStore::new();
        let result = store.transact(&UserId::generate(), None, &mut |_: &CreditBalance| {
            Decision::Abort
        });
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn list_transactions_newest_first_with_pagination() {
        let store = MemoryStore::new();
        let user_id = UserId::generate();
        seed(&store, user_id, 10);
        for i in 0..3 {
            store
                .transact(&user_id, None, &mut |current: &CreditBalance| {
                    Decision::Commit(spend_write(current, 1, &format!("msg-{i}")))
                })
                .unwrap();
        }

        let all = store.list_transactions(&user_id, 10, 0).unwrap();
        let sequences: Vec<u64> = all.iter().map(|tx| tx.sequence).collect();
        assert_eq!(sequences, vec![4, 3, 2, 1]);

        let page = store.list_transactions(&user_id, 2, 1).unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].sequence, 3);
    }

    #[test]
    fn message_ids_are_unique() {
        let store = MemoryStore::new();
        let cost = MessageCost {
            message_id: "msg-1".into(),
            user_id: UserId::generate(),
            conversation_id: credit_ledger_core::ConversationId::generate(),
            avatar_id: "sage".into(),
            input_tokens: 10,
            output_tokens: 10,
            credits_charged: 1,
            api_cost_cents: 0,
            provider: "openai".into(),
            model_name: "gpt-4o-mini".into(),
            created_at: Utc::now(),
        };

        store.put_message_cost(&cost).unwrap();
        assert!(matches!(
            store.put_message_cost(&cost),
            Err(StoreError::DuplicateMessage { .. })
        ));
        assert_eq!(
            store
                .list_message_costs_since(&cost.user_id, cost.created_at)
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn subscription_tier_is_an_association_only() {
        let store = MemoryStore::new();
        let user_id = UserId::generate();
        seed(&store, user_id, 10);

        let updated = store.set_subscription_tier(&user_id, Some("pro")).unwrap();
        assert_eq!(updated.subscription_tier_id.as_deref(), Some("pro"));
        assert_eq!(updated.current_balance, 10);
        assert_eq!(updated.sequence, 1);
    }
}
