//! Balance mutations: spends, grants, monthly cycles and message charges.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use credit_ledger_core::{
    CreditBalance, CreditTransaction, LedgerError, MessageUsage, Result, SourceType,
    TransactionSource, TransactionType, UserId,
};
use credit_ledger_store::{Decision, LedgerWrite, OperationKey, Store, StoreError};

use crate::clock::{Clock, SystemClock};
use crate::config::LedgerConfig;

/// Result of a spend attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SpendOutcome {
    /// The debit was written.
    Applied(CreditTransaction),
    /// The balance did not cover the amount. Nothing was written.
    Declined {
        /// Balance at decision time.
        balance: i64,
        /// Amount that was requested.
        required: i64,
    },
}

impl SpendOutcome {
    /// Whether the debit was written.
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    /// The written transaction, if any.
    #[must_use]
    pub const fn transaction(&self) -> Option<&CreditTransaction> {
        match self {
            Self::Applied(tx) => Some(tx),
            Self::Declined { .. } => None,
        }
    }

    /// Balance after the attempt.
    #[must_use]
    pub const fn balance(&self) -> i64 {
        match self {
            Self::Applied(tx) => tx.balance_after,
            Self::Declined { balance, .. } => *balance,
        }
    }
}

/// Result of charging a message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChargeOutcome {
    /// Credits the message cost.
    pub credits_charged: i64,
    /// Upstream API cost in cents.
    pub api_cost_cents: i64,
    /// What happened to the debit.
    pub spend: SpendOutcome,
}

/// A page of transactions, newest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionPage {
    /// The transactions on this page.
    pub transactions: Vec<CreditTransaction>,
    /// Whether older transactions exist past this page.
    pub has_more: bool,
}

/// Summary of a monthly grant run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MonthlyGrantReport {
    /// Users whose grant was written.
    pub granted: usize,
    /// Users with no grant due, no eligible tier, or an already applied grant.
    pub skipped: usize,
    /// Users whose grant could not be written.
    pub failed: usize,
}

/// The credit ledger engine.
///
/// All balance mutations go through [`Store::transact`], which serializes
/// them per user. The engine itself holds no per-user state.
pub struct CreditLedger {
    pub(crate) store: Arc<dyn Store>,
    pub(crate) config: LedgerConfig,
    pub(crate) clock: Arc<dyn Clock>,
}

impl CreditLedger {
    /// Create an engine on top of `store` using the system clock.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, config: LedgerConfig) -> Self {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    /// Create an engine with an explicit time source.
    #[must_use]
    pub fn with_clock(store: Arc<dyn Store>, config: LedgerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            config,
            clock,
        }
    }

    /// The engine configuration.
    #[must_use]
    pub const fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// The current time according to the engine's clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // =========================================================================
    // Balances
    // =========================================================================

    /// Get a user's balance, creating it with the initial grant on first access.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::StoreUnavailable` if the store fails.
    pub fn get_balance(&self, user_id: &UserId) -> Result<CreditBalance> {
        if let Some(balance) = self.store.get_balance(user_id)? {
            return Ok(balance);
        }

        let now = self.clock.now();
        let mut seed = LedgerWrite::new(CreditBalance::empty(
            *user_id,
            Some(self.config.default_tier_id.clone()),
            now,
        ));
        if self.config.initial_balance > 0 {
            let entry = CreditTransaction::record(
                &seed.balance,
                TransactionType::Granted,
                self.config.initial_balance,
                TransactionSource::new(SourceType::Migration)
                    .with_description(Some("Welcome credits".into())),
                now,
            );
            seed.push(entry);
        }

        let balance = self.store.get_or_create_balance(&seed)?;
        if balance == seed.balance {
            tracing::info!(
                user_id = %user_id,
                initial_balance = %balance.current_balance,
                "Balance created"
            );
        }

        Ok(balance)
    }

    /// Credits a user could spend right now, without creating a record.
    ///
    /// A user with no balance record has the initial balance they would
    /// receive on first access.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::StoreUnavailable` if the store fails.
    pub fn available_credits(&self, user_id: &UserId) -> Result<i64> {
        Ok(self
            .store
            .get_balance(user_id)?
            .map_or(self.config.initial_balance, |balance| balance.current_balance))
    }

    /// Check whether a user's balance covers `required` credits.
    ///
    /// Never writes, and reserves nothing.
    ///
    /// # Errors
    ///
    /// - `LedgerError::Validation` if `required` is negative.
    /// - `LedgerError::StoreUnavailable` if the store fails.
    pub fn has_sufficient_credits(&self, user_id: &UserId, required: i64) -> Result<bool> {
        if required < 0 {
            return Err(LedgerError::validation("required credits must not be negative"));
        }

        Ok(self.available_credits(user_id)? >= required)
    }

    /// Debit `amount` credits if the balance covers them.
    ///
    /// # Errors
    ///
    /// - `LedgerError::Validation` if `amount` is not positive.
    /// - `LedgerError::DuplicateOperation` if `source` carries a correlation id
    ///   that was already applied.
    /// - `LedgerError::StoreUnavailable` if the outcome could not be confirmed.
    pub fn spend(
        &self,
        user_id: &UserId,
        amount: i64,
        source: TransactionSource,
    ) -> Result<SpendOutcome> {
        if amount <= 0 {
            return Err(LedgerError::validation("spend amount must be positive"));
        }

        self.get_balance(user_id)?;

        let operation = operation_key(user_id, &source);
        let mut declined_at = 0;
        let committed = self
            .store
            .transact(user_id, operation.as_ref(), &mut |current: &CreditBalance| {
                if !current.has_sufficient_credits(amount) {
                    declined_at = current.current_balance;
                    return Decision::Abort;
                }

                let entry = CreditTransaction::record(
                    current,
                    TransactionType::Spent,
                    -amount,
                    source.clone(),
                    self.clock.now(),
                );
                let mut write = LedgerWrite::new(current.clone());
                write.push(entry);
                Decision::Commit(write)
            })
            .map_err(|e| log_rejection(user_id, e))?;

        let Some(write) = committed else {
            tracing::debug!(
                user_id = %user_id,
                amount = %amount,
                balance = %declined_at,
                "Spend declined"
            );
            return Ok(SpendOutcome::Declined {
                balance: declined_at,
                required: amount,
            });
        };

        let tx = last_entry(write)?;
        tracing::info!(
            user_id = %user_id,
            amount = %amount,
            source_type = %tx.source_type,
            new_balance = %tx.balance_after,
            "Credits spent"
        );

        Ok(SpendOutcome::Applied(tx))
    }

    /// Credit `amount` to a user.
    ///
    /// # Errors
    ///
    /// - `LedgerError::Validation` if `amount` is not positive or
    ///   `transaction_type` does not increase balances.
    /// - `LedgerError::DuplicateOperation` if the correlation id was already applied.
    /// - `LedgerError::StoreUnavailable` if the outcome could not be confirmed.
    pub fn grant(
        &self,
        user_id: &UserId,
        amount: i64,
        transaction_type: TransactionType,
        source: TransactionSource,
    ) -> Result<CreditTransaction> {
        if amount <= 0 {
            return Err(LedgerError::validation("grant amount must be positive"));
        }
        if !transaction_type.is_grantable() {
            return Err(LedgerError::validation(format!(
                "transaction type {transaction_type} cannot be granted"
            )));
        }

        self.get_balance(user_id)?;

        let operation = operation_key(user_id, &source);
        let mut overflowed = false;
        let committed = self
            .store
            .transact(user_id, operation.as_ref(), &mut |current: &CreditBalance| {
                if current.current_balance.checked_add(amount).is_none() {
                    overflowed = true;
                    return Decision::Abort;
                }

                let entry = CreditTransaction::record(
                    current,
                    transaction_type,
                    amount,
                    source.clone(),
                    self.clock.now(),
                );
                let mut write = LedgerWrite::new(current.clone());
                write.push(entry);
                Decision::Commit(write)
            })
            .map_err(|e| log_rejection(user_id, e))?;

        if overflowed {
            return Err(LedgerError::validation(format!(
                "grant of {amount} credits would overflow the balance"
            )));
        }

        let tx = committed
            .ok_or_else(|| LedgerError::StoreUnavailable("grant was not committed".into()))
            .and_then(last_entry)?;

        tracing::info!(
            user_id = %user_id,
            amount = %amount,
            transaction_type = %transaction_type,
            source_type = %tx.source_type,
            new_balance = %tx.balance_after,
            "Credits granted"
        );

        Ok(tx)
    }

    // =========================================================================
    // Monthly Grants
    // =========================================================================

    /// Apply the subscription cycle grant if one is due at `now`.
    ///
    /// Credits above the tier's rollover cap are forfeited with an `expired`
    /// entry, then the tier's monthly credits are added with a `granted`
    /// entry. Both are written in one commit. Returns `None` when the user
    /// has no balance record, no active tier, or no grant due.
    ///
    /// # Errors
    ///
    /// - `LedgerError::DuplicateOperation` if the grant for this day was
    ///   already applied.
    /// - `LedgerError::StoreUnavailable` if the outcome could not be confirmed.
    pub fn apply_monthly_grant(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<Vec<CreditTransaction>>> {
        let Some(balance) = self.store.get_balance(user_id)? else {
            return Ok(None);
        };
        let Some(tier_id) = balance.subscription_tier_id.as_deref() else {
            return Ok(None);
        };
        let tier = match self.store.get_tier(tier_id)? {
            Some(tier) if tier.is_active => tier,
            _ => {
                tracing::debug!(user_id = %user_id, tier_id = %tier_id, "No active tier for monthly grant");
                return Ok(None);
            }
        };

        let cycle = self.config.grant_cycle();
        let source_id = format!("monthly:{}", now.format("%Y-%m-%d"));
        let operation = OperationKey::new(*user_id, SourceType::MonthlyGrant, source_id.clone());

        let mut overflowed = false;
        let committed = self
            .store
            .transact(user_id, Some(&operation), &mut |current: &CreditBalance| {
                if current
                    .last_monthly_grant
                    .is_some_and(|last| now - last < cycle)
                {
                    return Decision::Abort;
                }

                let kept = current.current_balance.min(tier.max_rollover).max(0);
                if kept.checked_add(tier.monthly_credits).is_none() {
                    overflowed = true;
                    return Decision::Abort;
                }
                let forfeited = current.current_balance - kept;
                let mut write = LedgerWrite::new(current.clone());

                if forfeited > 0 {
                    let entry = CreditTransaction::record(
                        &write.balance,
                        TransactionType::Expired,
                        -forfeited,
                        TransactionSource::new(SourceType::MonthlyGrant)
                            .with_source_id(Some(source_id.clone()))
                            .with_description(Some(format!(
                                "Unused credits above {} rollover cap",
                                tier.name
                            ))),
                        now,
                    );
                    write.push(entry);
                }
                if tier.monthly_credits > 0 {
                    let entry = CreditTransaction::record(
                        &write.balance,
                        TransactionType::Granted,
                        tier.monthly_credits,
                        TransactionSource::new(SourceType::MonthlyGrant)
                            .with_source_id(Some(source_id.clone()))
                            .with_description(Some(format!("{} monthly credits", tier.name))),
                        now,
                    );
                    write.push(entry);
                }

                write.balance.last_monthly_grant = Some(now);
                Decision::Commit(write)
            })
            .map_err(|e| log_rejection(user_id, e))?;

        if overflowed {
            return Err(LedgerError::validation(format!(
                "{} monthly credits would overflow the balance",
                tier.name
            )));
        }

        let Some(write) = committed else {
            return Ok(None);
        };

        tracing::info!(
            user_id = %user_id,
            tier_id = %tier.id,
            new_balance = %write.balance.current_balance,
            entries = %write.entries.len(),
            "Monthly grant applied"
        );

        Ok(Some(write.entries))
    }

    /// Apply monthly grants for many users, continuing past failures.
    pub fn apply_monthly_grants(&self, user_ids: &[UserId], now: DateTime<Utc>) -> MonthlyGrantReport {
        let mut report = MonthlyGrantReport::default();

        for user_id in user_ids {
            match self.apply_monthly_grant(user_id, now) {
                Ok(Some(_)) => report.granted += 1,
                Ok(None) | Err(LedgerError::DuplicateOperation { .. }) => report.skipped += 1,
                Err(e) => {
                    tracing::warn!(user_id = %user_id, error = %e, "Monthly grant failed");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            granted = %report.granted,
            skipped = %report.skipped,
            failed = %report.failed,
            "Monthly grant run finished"
        );

        report
    }

    // =========================================================================
    // History
    // =========================================================================

    /// List a user's transactions, newest first.
    ///
    /// `limit` is capped at the configured maximum page size.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::StoreUnavailable` if the store fails.
    pub fn list_transactions(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<TransactionPage> {
        let limit = limit.min(self.config.max_page_size);
        if limit == 0 {
            return Ok(TransactionPage {
                transactions: Vec::new(),
                has_more: false,
            });
        }

        let mut transactions = self
            .store
            .list_transactions(user_id, limit.saturating_add(1), offset)?;
        let has_more = transactions.len() > limit;
        transactions.truncate(limit);

        Ok(TransactionPage {
            transactions,
            has_more,
        })
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Associate a user with a tier, or clear the association.
    ///
    /// Does not grant credits; the next monthly grant uses the new tier.
    ///
    /// # Errors
    ///
    /// - `LedgerError::UnknownTier` if `tier_id` is not in the catalog.
    /// - `LedgerError::StoreUnavailable` if the store fails.
    pub fn update_subscription_tier(
        &self,
        user_id: &UserId,
        tier_id: Option<&str>,
    ) -> Result<CreditBalance> {
        if let Some(tier_id) = tier_id {
            if self.store.get_tier(tier_id)?.is_none() {
                return Err(LedgerError::UnknownTier {
                    tier_id: tier_id.to_string(),
                });
            }
        }

        self.get_balance(user_id)?;
        let balance = self.store.set_subscription_tier(user_id, tier_id)?;

        tracing::info!(
            user_id = %user_id,
            tier_id = ?tier_id,
            "Subscription tier updated"
        );

        Ok(balance)
    }

    // =========================================================================
    // Message Charges
    // =========================================================================

    /// Price a message from its token counts and debit it.
    ///
    /// The message id is the spend's correlation id, so a retried report is
    /// rejected as a duplicate. The cost row is recorded only when the debit
    /// is applied.
    ///
    /// # Errors
    ///
    /// - `LedgerError::Validation` if the message id is empty or the message
    ///   has no billable usage.
    /// - `LedgerError::DuplicateOperation` if the message was already charged.
    /// - `LedgerError::StoreUnavailable` if the outcome could not be confirmed.
    pub fn charge_message(&self, usage: MessageUsage) -> Result<ChargeOutcome> {
        if usage.message_id.is_empty() {
            return Err(LedgerError::validation("message id must not be empty"));
        }

        let pricing = &self.config.pricing;
        let credits = usage.credits_override.unwrap_or_else(|| {
            pricing.calculate_credits(
                &usage.provider,
                &usage.model_name,
                usage.input_tokens,
                usage.output_tokens,
            )
        });
        if credits <= 0 {
            return Err(LedgerError::validation("message has no billable usage"));
        }
        let api_cost_cents = pricing.calculate_api_cost_cents(
            &usage.provider,
            &usage.model_name,
            usage.input_tokens,
            usage.output_tokens,
        );

        let source = TransactionSource::new(SourceType::Usage)
            .with_source_id(Some(usage.message_id.clone()))
            .with_description(Some(format!(
                "{} reply ({})",
                usage.avatar_id, usage.model_name
            )))
            .with_metadata(serde_json::json!({
                "conversation_id": usage.conversation_id,
                "avatar_id": usage.avatar_id,
                "provider": usage.provider,
                "model_name": usage.model_name,
                "input_tokens": usage.input_tokens,
                "output_tokens": usage.output_tokens,
            }));

        let user_id = usage.user_id;
        let spend = self.spend(&user_id, credits, source)?;

        if let Some(tx) = spend.transaction() {
            let cost = usage.into_cost(credits, api_cost_cents, tx.created_at);
            if let Err(e) = self.store.put_message_cost(&cost) {
                // The debit stands; only analytics lose the row.
                tracing::warn!(
                    user_id = %user_id,
                    message_id = %cost.message_id,
                    error = %e,
                    "Failed to record message cost"
                );
            }
        }

        Ok(ChargeOutcome {
            credits_charged: credits,
            api_cost_cents,
            spend,
        })
    }
}

fn operation_key(user_id: &UserId, source: &TransactionSource) -> Option<OperationKey> {
    source
        .source_id
        .as_ref()
        .map(|source_id| OperationKey::new(*user_id, source.source_type, source_id.clone()))
}

fn last_entry(write: LedgerWrite) -> Result<CreditTransaction> {
    write
        .entries
        .into_iter()
        .last()
        .ok_or_else(|| LedgerError::StoreUnavailable("commit returned no entries".into()))
}

fn log_rejection(user_id: &UserId, error: StoreError) -> LedgerError {
    match &error {
        StoreError::DuplicateOperation {
            source_id,
            transaction_id,
        } => tracing::debug!(
            user_id = %user_id,
            source_id = %source_id,
            transaction_id = %transaction_id,
            "Duplicate operation rejected"
        ),
        StoreError::Database(_) | StoreError::Serialization(_) => tracing::warn!(
            user_id = %user_id,
            error = %error,
            "Store failure"
        ),
        StoreError::NotFound { .. } | StoreError::DuplicateMessage { .. } => {}
    }
    error.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use credit_ledger_core::{Catalog, ConversationId};
    use credit_ledger_store::MemoryStore;

    use crate::clock::ManualClock;

    fn create_ledger() -> (CreditLedger, Arc<ManualClock>) {
        let store = Arc::new(MemoryStore::new());
        for tier in Catalog::builtin().tiers {
            store.put_tier(&tier).unwrap();
        }
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let ledger = CreditLedger::with_clock(store, LedgerConfig::default(), clock.clone());
        (ledger, clock)
    }

    fn usage_source(id: &str) -> TransactionSource {
        TransactionSource::new(SourceType::Usage).with_source_id(Some(id.into()))
    }

    // ========================================================================
    // Balances
    // ========================================================================

    #[test]
    fn new_user_gets_welcome_grant() {
        let (ledger, _) = create_ledger();
        let user_id = UserId::generate();

        let balance = ledger.get_balance(&user_id).unwrap();
        assert_eq!(balance.current_balance, 10);
        assert_eq!(balance.subscription_tier_id.as_deref(), Some("free"));

        let page = ledger.list_transactions(&user_id, 10, 0).unwrap();
        assert_eq!(page.transactions.len(), 1);
        let tx = &page.transactions[0];
        assert_eq!(tx.transaction_type, TransactionType::Granted);
        assert_eq!(tx.source_type, SourceType::Migration);
        assert_eq!(tx.amount, 10);
        assert_eq!(tx.balance_before, 0);
        assert_eq!(tx.balance_after, 10);

        // Second read does not grant again.
        ledger.get_balance(&user_id).unwrap();
        assert_eq!(ledger.list_transactions(&user_id, 10, 0).unwrap().transactions.len(), 1);
    }

    #[test]
    fn sufficiency_check_never_writes() {
        let (ledger, _) = create_ledger();
        let user_id = UserId::generate();

        assert!(ledger.has_sufficient_credits(&user_id, 10).unwrap());
        assert!(!ledger.has_sufficient_credits(&user_id, 11).unwrap());
        assert!(ledger.store.get_balance(&user_id).unwrap().is_none());

        assert!(matches!(
            ledger.has_sufficient_credits(&user_id, -1),
            Err(LedgerError::Validation(_))
        ));
    }

    // ========================================================================
    // Spends
    // ========================================================================

    #[test]
    fn spend_to_zero_then_decline() {
        let (ledger, _) = create_ledger();
        let user_id = UserId::generate();

        let outcome = ledger.spend(&user_id, 10, usage_source("msg-1")).unwrap();
        assert!(outcome.is_applied());
        assert_eq!(outcome.balance(), 0);

        let outcome = ledger.spend(&user_id, 1, usage_source("msg-2")).unwrap();
        assert_eq!(
            outcome,
            SpendOutcome::Declined {
                balance: 0,
                required: 1
            }
        );

        let balance = ledger.get_balance(&user_id).unwrap();
        assert_eq!(balance.current_balance, 0);
        assert_eq!(balance.total_spent, 10);
        assert_eq!(ledger.list_transactions(&user_id, 10, 0).unwrap().transactions.len(), 2);
    }

    #[test]
    fn spend_rejects_non_positive_amounts() {
        let (ledger, _) = create_ledger();
        let user_id = UserId::generate();

        for amount in [0, -5] {
            assert!(matches!(
                ledger.spend(&user_id, amount, usage_source("msg")),
                Err(LedgerError::Validation(_))
            ));
        }
    }

    #[test]
    fn retried_spend_reports_original_transaction() {
        let (ledger, _) = create_ledger();
        let user_id = UserId::generate();

        let first = ledger.spend(&user_id, 3, usage_source("msg-1")).unwrap();
        let original_id = first.transaction().unwrap().id;

        match ledger.spend(&user_id, 3, usage_source("msg-1")) {
            Err(LedgerError::DuplicateOperation { transaction_id, .. }) => {
                assert_eq!(transaction_id, original_id);
            }
            other => panic!("expected duplicate, got {other:?}"),
        }
        assert_eq!(ledger.get_balance(&user_id).unwrap().current_balance, 7);
    }

    // ========================================================================
    // Grants
    // ========================================================================

    #[test]
    fn purchase_grant_bumps_purchased_counter() {
        let (ledger, _) = create_ledger();
        let user_id = UserId::generate();

        let tx = ledger
            .grant(
                &user_id,
                150,
                TransactionType::Purchased,
                TransactionSource::new(SourceType::Purchase).with_source_id(Some("iap-1".into())),
            )
            .unwrap();
        assert_eq!(tx.balance_before, 10);
        assert_eq!(tx.balance_after, 160);

        let balance = ledger.get_balance(&user_id).unwrap();
        assert_eq!(balance.total_purchased, 150);
        assert_eq!(balance.total_earned, 10);
    }

    #[test]
    fn grant_rejects_debit_types() {
        let (ledger, _) = create_ledger();
        let user_id = UserId::generate();

        for transaction_type in [TransactionType::Spent, TransactionType::Expired] {
            assert!(matches!(
                ledger.grant(
                    &user_id,
                    5,
                    transaction_type,
                    TransactionSource::new(SourceType::Promotion)
                ),
                Err(LedgerError::Validation(_))
            ));
        }
        assert!(matches!(
            ledger.grant(
                &user_id,
                0,
                TransactionType::Earned,
                TransactionSource::new(SourceType::Promotion)
            ),
            Err(LedgerError::Validation(_))
        ));
    }

    #[test]
    fn refund_may_reuse_spend_correlation_id() {
        let (ledger, _) = create_ledger();
        let user_id = UserId::generate();

        ledger.spend(&user_id, 4, usage_source("msg-1")).unwrap();
        let refund = ledger
            .grant(
                &user_id,
                4,
                TransactionType::Refunded,
                TransactionSource::new(SourceType::Refund).with_source_id(Some("msg-1".into())),
            )
            .unwrap();

        assert_eq!(refund.balance_after, 10);
    }

    #[test]
    fn grant_that_would_overflow_is_rejected() {
        let (ledger, _) = create_ledger();
        let user_id = UserId::generate();

        assert!(matches!(
            ledger.grant(
                &user_id,
                i64::MAX,
                TransactionType::Granted,
                TransactionSource::new(SourceType::Promotion)
            ),
            Err(LedgerError::Validation(_))
        ));

        let balance = ledger.get_balance(&user_id).unwrap();
        assert_eq!(balance.current_balance, 10);
        assert_eq!(balance.total_earned, 10);
        assert_eq!(balance.sequence, 1);
        assert_eq!(
            ledger.list_transactions(&user_id, 10, 0).unwrap().transactions.len(),
            1
        );
    }

    // ========================================================================
    // Monthly Grants
    // ========================================================================

    #[test]
    fn monthly_grant_rolls_over_capped_balance() {
        let (ledger, clock) = create_ledger();
        let user_id = UserId::generate();
        ledger.update_subscription_tier(&user_id, Some("starter")).unwrap();
        ledger
            .grant(
                &user_id,
                70,
                TransactionType::Granted,
                TransactionSource::new(SourceType::Promotion),
            )
            .unwrap();
        assert_eq!(ledger.get_balance(&user_id).unwrap().current_balance, 80);

        let now = clock.now();
        let entries = ledger.apply_monthly_grant(&user_id, now).unwrap().unwrap();

        // 80 capped at 50, plus 100 monthly.
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].transaction_type, TransactionType::Expired);
        assert_eq!(entries[0].amount, -30);
        assert_eq!(entries[1].transaction_type, TransactionType::Granted);
        assert_eq!(entries[1].amount, 100);
        assert_eq!(entries[1].balance_after, 150);

        let balance = ledger.get_balance(&user_id).unwrap();
        assert_eq!(balance.current_balance, 150);
        assert_eq!(balance.last_monthly_grant, Some(now));
    }

    #[test]
    fn monthly_grant_waits_for_cycle() {
        let (ledger, clock) = create_ledger();
        let user_id = UserId::generate();
        ledger.get_balance(&user_id).unwrap();

        let start = clock.now();
        assert!(ledger.apply_monthly_grant(&user_id, start).unwrap().is_some());
        assert!(ledger
            .apply_monthly_grant(&user_id, start + Duration::days(29))
            .unwrap()
            .is_none());
        assert!(ledger
            .apply_monthly_grant(&user_id, start + Duration::days(30))
            .unwrap()
            .is_some());
    }

    #[test]
    fn monthly_grant_entries_use_grant_time() {
        let (ledger, clock) = create_ledger();
        let user_id = UserId::generate();
        ledger.get_balance(&user_id).unwrap();

        let scheduled = clock.now() + Duration::days(3);
        let entries = ledger
            .apply_monthly_grant(&user_id, scheduled)
            .unwrap()
            .unwrap();

        // Free tier keeps nothing, so the welcome credits expire first.
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|tx| tx.created_at == scheduled));
        assert_eq!(
            entries[1].source_id.as_deref(),
            Some(format!("monthly:{}", scheduled.format("%Y-%m-%d")).as_str())
        );
        assert_eq!(
            ledger.get_balance(&user_id).unwrap().last_monthly_grant,
            Some(scheduled)
        );
    }

    #[test]
    fn monthly_grant_that_would_overflow_is_rejected() {
        let (ledger, clock) = create_ledger();
        ledger
            .store
            .put_tier(&credit_ledger_core::SubscriptionTier {
                id: "whale".into(),
                name: "Whale".into(),
                monthly_credits: i64::MAX,
                max_rollover: 100,
                price_cents: 99_999,
                features: Vec::new(),
                is_active: true,
                sort_order: 9,
            })
            .unwrap();
        let user_id = UserId::generate();
        ledger.update_subscription_tier(&user_id, Some("whale")).unwrap();

        assert!(matches!(
            ledger.apply_monthly_grant(&user_id, clock.now()),
            Err(LedgerError::Validation(_))
        ));

        let balance = ledger.get_balance(&user_id).unwrap();
        assert_eq!(balance.current_balance, 10);
        assert!(balance.last_monthly_grant.is_none());
    }

    #[test]
    fn monthly_grant_skips_users_without_tier() {
        let (ledger, clock) = create_ledger();
        let user_id = UserId::generate();
        ledger.update_subscription_tier(&user_id, None).unwrap();

        assert!(ledger.apply_monthly_grant(&user_id, clock.now()).unwrap().is_none());
        assert!(ledger
            .apply_monthly_grant(&UserId::generate(), clock.now())
            .unwrap()
            .is_none());
    }

    #[test]
    fn batch_grant_counts_outcomes() {
        let (ledger, clock) = create_ledger();
        let due = UserId::generate();
        let no_tier = UserId::generate();
        ledger.get_balance(&due).unwrap();
        ledger.update_subscription_tier(&no_tier, None).unwrap();

        let report = ledger.apply_monthly_grants(&[due, no_tier], clock.now());
        assert_eq!(
            report,
            MonthlyGrantReport {
                granted: 1,
                skipped: 1,
                failed: 0
            }
        );
    }

    // ========================================================================
    // History & Subscriptions
    // ========================================================================

    #[test]
    fn transaction_pages_report_more() {
        let (ledger, _) = create_ledger();
        let user_id = UserId::generate();
        for i in 0..4 {
            ledger.spend(&user_id, 1, usage_source(&format!("msg-{i}"))).unwrap();
        }

        let first = ledger.list_transactions(&user_id, 3, 0).unwrap();
        assert_eq!(first.transactions.len(), 3);
        assert!(first.has_more);
        assert_eq!(first.transactions[0].sequence, 5);

        let last = ledger.list_transactions(&user_id, 3, 3).unwrap();
        assert_eq!(last.transactions.len(), 2);
        assert!(!last.has_more);
    }

    #[test]
    fn page_past_the_end_is_empty() {
        let (ledger, _) = create_ledger();
        let user_id = UserId::generate();
        ledger.spend(&user_id, 1, usage_source("msg-1")).unwrap();

        let page = ledger.list_transactions(&user_id, 3, usize::MAX).unwrap();
        assert!(page.transactions.is_empty());
        assert!(!page.has_more);
    }

    #[test]
    fn unknown_tier_is_rejected() {
        let (ledger, _) = create_ledger();
        let user_id = UserId::generate();

        assert!(matches!(
            ledger.update_subscription_tier(&user_id, Some("platinum")),
            Err(LedgerError::UnknownTier { .. })
        ));

        let balance = ledger.update_subscription_tier(&user_id, Some("pro")).unwrap();
        assert_eq!(balance.subscription_tier_id.as_deref(), Some("pro"));
        assert_eq!(balance.current_balance, 10);
    }

    // ========================================================================
    // Message Charges
    // ========================================================================

    fn message(user_id: UserId, message_id: &str, tokens: u64) -> MessageUsage {
        MessageUsage {
            message_id: message_id.into(),
            user_id,
            conversation_id: ConversationId::generate(),
            avatar_id: "sage".into(),
            provider: "anthropic".into(),
            model_name: "claude-3-5-sonnet".into(),
            input_tokens: tokens,
            output_tokens: tokens,
            credits_override: None,
        }
    }

    #[test]
    fn charge_message_prices_and_records_cost() {
        let (ledger, clock) = create_ledger();
        let user_id = UserId::generate();

        // 1500 in @ 1000/M + 1500 out @ 5000/M = 1 + 7.
        let outcome = ledger.charge_message(message(user_id, "msg-1", 1500)).unwrap();
        assert_eq!(outcome.credits_charged, 8);
        assert_eq!(outcome.spend.balance(), 2);

        // Tiny replies still cost the minimum.
        let outcome = ledger.charge_message(message(user_id, "msg-2", 10)).unwrap();
        assert_eq!(outcome.credits_charged, 1);
        assert_eq!(outcome.spend.balance(), 1);

        let costs = ledger
            .store
            .list_message_costs_since(&user_id, clock.now() - Duration::days(1))
            .unwrap();
        assert_eq!(costs.len(), 2);
        assert_eq!(costs[0].credits_charged, 8);
    }

    #[test]
    fn declined_charge_records_nothing() {
        let (ledger, clock) = create_ledger();
        let user_id = UserId::generate();

        let mut usage = message(user_id, "msg-1", 100);
        usage.credits_override = Some(25);
        let outcome = ledger.charge_message(usage).unwrap();
        assert!(!outcome.spend.is_applied());

        let costs = ledger
            .store
            .list_message_costs_since(&user_id, clock.now() - Duration::days(1))
            .unwrap();
        assert!(costs.is_empty());
    }

    #[test]
    fn charge_message_requires_usage() {
        let (ledger, _) = create_ledger();
        let usage = message(UserId::generate(), "msg-1", 0);

        assert!(matches!(
            ledger.charge_message(usage),
            Err(LedgerError::Validation(_))
        ));
    }
}
