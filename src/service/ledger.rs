use anyhow::Result;
use uuid::Uuid;

use crate::domain::wallet::CommissionWallet;
use crate::error::CoreError;
use crate::repo::wallets_repo::WalletsRepo;

/// Commission in integer minor units, round-half-up on the fractional
/// unit. Fee rates are carried as basis points so the whole path stays in
/// integer arithmetic.
pub fn commission_for(amount_minor: i64, fee_bps: i32) -> i64 {
    (amount_minor * fee_bps as i64 + 5_000) / 10_000
}

/// Store seam for the ledger. The Postgres implementation enforces
/// at-most-once booking and the balance guard in SQL; any implementation
/// must keep those semantics.
#[async_trait::async_trait]
pub trait WalletStore: Send + Sync {
    async fn find_by_client(&self, client_id: Uuid) -> Result<Option<CommissionWallet>>;
    async fn get(&self, wallet_id: Uuid) -> Result<Option<CommissionWallet>>;
    /// Returns whether an entry was written (false = duplicate).
    async fn book_commission(
        &self,
        wallet_id: Uuid,
        transaction_id: &str,
        commission_minor: i64,
    ) -> Result<bool>;
    /// Returns whether the payout was booked (false = guard refused).
    async fn book_payout(&self, wallet_id: Uuid, amount_minor: i64) -> Result<bool>;
}

#[async_trait::async_trait]
impl WalletStore for WalletsRepo {
    async fn find_by_client(&self, client_id: Uuid) -> Result<Option<CommissionWallet>> {
        WalletsRepo::find_by_client(self, client_id).await
    }

    async fn get(&self, wallet_id: Uuid) -> Result<Option<CommissionWallet>> {
        WalletsRepo::get(self, wallet_id).await
    }

    async fn book_commission(
        &self,
        wallet_id: Uuid,
        transaction_id: &str,
        commission_minor: i64,
    ) -> Result<bool> {
        WalletsRepo::book_commission(self, wallet_id, transaction_id, commission_minor).await
    }

    async fn book_payout(&self, wallet_id: Uuid, amount_minor: i64) -> Result<bool> {
        WalletsRepo::book_payout(self, wallet_id, amount_minor).await
    }
}

#[derive(Clone)]
pub struct CommissionLedger<S = WalletsRepo> {
    pub wallets_repo: S,
}

impl<S: WalletStore> CommissionLedger<S> {
    /// Book the commission for a paid transaction against the client's
    /// wallet. Duplicate bookings for the same transaction are no-ops.
    pub async fn book(
        &self,
        client_id: Uuid,
        transaction_id: &str,
        amount_minor: i64,
        fee_bps: i32,
    ) -> Result<(), CoreError> {
        let wallet = self
            .wallets_repo
            .find_by_client(client_id)
            .await?
            .ok_or(CoreError::NotFound("wallet"))?;

        let commission = commission_for(amount_minor, fee_bps);
        let booked = self
            .wallets_repo
            .book_commission(wallet.id, transaction_id, commission)
            .await?;
        if booked {
            tracing::info!(
                %transaction_id,
                wallet_id = %wallet.id,
                commission,
                "commission booked"
            );
        } else {
            tracing::debug!(%transaction_id, "commission already booked, skipping");
        }
        Ok(())
    }

    pub async fn payout(&self, wallet_id: Uuid, amount_minor: i64) -> Result<(), CoreError> {
        if amount_minor <= 0 {
            return Err(CoreError::Validation("payout amount must be > 0".to_string()));
        }
        let booked = self.wallets_repo.book_payout(wallet_id, amount_minor).await?;
        if !booked {
            // wallet missing or balance too low; distinguish for the caller
            match self.wallets_repo.get(wallet_id).await? {
                Some(_) => return Err(CoreError::InsufficientBalance),
                None => return Err(CoreError::NotFound("wallet")),
            }
        }
        tracing::info!(%wallet_id, amount_minor, "commission payout booked");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_of_amount() {
        // 3.5% of 10000 minor units
        assert_eq!(commission_for(10_000, 350), 350);
    }

    #[test]
    fn rounds_half_up() {
        // 25% of 2 = 0.5 -> 1
        assert_eq!(commission_for(2, 2_500), 1);
        // 2.5% of 10 = 0.25 -> 0
        assert_eq!(commission_for(10, 250), 0);
        // 1.5% of 9999 = 149.985 -> 150
        assert_eq!(commission_for(9_999, 150), 150);
    }

    #[test]
    fn zero_fee_books_nothing() {
        assert_eq!(commission_for(123_456, 0), 0);
    }
}
