//! Tier and package catalog access.

use credit_ledger_core::{Catalog, CreditPackage, Result, SubscriptionTier};

use crate::CreditLedger;

impl CreditLedger {
    /// Active subscription tiers in catalog order.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::StoreUnavailable` if the store fails.
    pub fn list_tiers(&self) -> Result<Vec<SubscriptionTier>> {
        let mut tiers: Vec<_> = self
            .store
            .list_tiers()?
            .into_iter()
            .filter(|tier| tier.is_active)
            .collect();
        tiers.sort_by_key(|tier| tier.sort_order);
        Ok(tiers)
    }

    /// Active credit packages in catalog order.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::StoreUnavailable` if the store fails.
    pub fn list_packages(&self) -> Result<Vec<CreditPackage>> {
        let mut packages: Vec<_> = self
            .store
            .list_packages()?
            .into_iter()
            .filter(|package| package.is_active)
            .collect();
        packages.sort_by_key(|package| package.sort_order);
        Ok(packages)
    }

    /// Look up a tier by id, active or not.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::StoreUnavailable` if the store fails.
    pub fn get_tier(&self, tier_id: &str) -> Result<Option<SubscriptionTier>> {
        Ok(self.store.get_tier(tier_id)?)
    }

    /// Insert or replace every tier and package in `catalog`.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::StoreUnavailable` if the store fails.
    pub fn seed_catalog(&self, catalog: &Catalog) -> Result<()> {
        for tier in &catalog.tiers {
            self.store.put_tier(tier)?;
        }
        for package in &catalog.packages {
            self.store.put_package(package)?;
        }

        tracing::debug!(
            tiers = %catalog.tiers.len(),
            packages = %catalog.packages.len(),
            "Catalog seeded"
        );

        Ok(())
    }
}
