use anyhow::Result;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::domain::wallet::{CommissionEntry, CommissionWallet, EntryType};

#[derive(Clone)]
pub struct WalletsRepo {
    pub pool: PgPool,
}

impl WalletsRepo {
    pub async fn get(&self, wallet_id: Uuid) -> Result<Option<CommissionWallet>> {
        let row = sqlx::query(
            "SELECT id, client_id, balance_due, warn_threshold, wa_last_sent FROM commission_wallets WHERE id = $1",
        )
        .bind(wallet_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(row_to_wallet))
    }

    pub async fn find_by_client(&self, client_id: Uuid) -> Result<Option<CommissionWallet>> {
        let row = sqlx::query(
            "SELECT id, client_id, balance_due, warn_threshold, wa_last_sent FROM commission_wallets WHERE client_id = $1",
        )
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(row_to_wallet))
    }

    /// Book a COMMISSION entry and increment the wallet balance in one
    /// transaction. The partial unique index on `transaction_id` turns a
    /// duplicate booking into a no-op; returns whether an entry was written.
    pub async fn book_commission(
        &self,
        wallet_id: Uuid,
        transaction_id: &str,
        commission_minor: i64,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO commission_entries (wallet_id, amount, entry_type, transaction_id)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (transaction_id) WHERE entry_type = 'COMMISSION' DO NOTHING
            "#,
        )
        .bind(wallet_id)
        .bind(commission_minor)
        .bind(EntryType::Commission.as_str())
        .bind(transaction_id)
        .execute(tx.as_mut())
        .await?;

        if inserted.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            "UPDATE commission_wallets SET balance_due = balance_due + $2, updated_at = now() WHERE id = $1",
        )
        .bind(wallet_id)
        .bind(commission_minor)
        .execute(tx.as_mut())
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Book a COMMISSION_PAYOUT entry and decrement the balance atomically.
    /// The `balance_due >= amount` guard makes an oversized payout a no-op;
    /// returns whether the payout was booked.
    pub async fn book_payout(&self, wallet_id: Uuid, amount_minor: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE commission_wallets
            SET balance_due = balance_due - $2, updated_at = now()
            WHERE id = $1 AND balance_due >= $2
            "#,
        )
        .bind(wallet_id)
        .bind(amount_minor)
        .execute(tx.as_mut())
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO commission_entries (wallet_id, amount, entry_type) VALUES ($1, $2, $3)",
        )
        .bind(wallet_id)
        .bind(-amount_minor)
        .bind(EntryType::CommissionPayout.as_str())
        .execute(tx.as_mut())
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    pub async fn list_over_warn_threshold(&self) -> Result<Vec<CommissionWallet>> {
        let rows = sqlx::query(
            "SELECT id, client_id, balance_due, warn_threshold, wa_last_sent FROM commission_wallets WHERE balance_due > warn_threshold",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(row_to_wallet).collect())
    }

    pub async fn list_payout_eligible(&self, min_payout_minor: i64) -> Result<Vec<CommissionWallet>> {
        let rows = sqlx::query(
            "SELECT id, client_id, balance_due, warn_threshold, wa_last_sent FROM commission_wallets WHERE balance_due >= $1",
        )
        .bind(min_payout_minor)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(row_to_wallet).collect())
    }

    /// Highest entry id for the wallet, 0 when the ledger is empty. Any
    /// booked entry moves it, so it distinguishes "same payout retried"
    /// from "new payout after the last one settled".
    pub async fn ledger_head(&self, wallet_id: Uuid) -> Result<i64> {
        let row = sqlx::query(
            "SELECT COALESCE(MAX(id), 0) AS head FROM commission_entries WHERE wallet_id = $1",
        )
        .bind(wallet_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get("head"))
    }

    /// Ledger statement, newest first.
    pub async fn list_entries(&self, wallet_id: Uuid, limit: i64) -> Result<Vec<CommissionEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, wallet_id, amount, entry_type, transaction_id, created_at
            FROM commission_entries
            WHERE wallet_id = $1
            ORDER BY id DESC
            LIMIT $2
            "#,
        )
        .bind(wallet_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| {
                let entry_type: String = r.get("entry_type");
                Ok(CommissionEntry {
                    id: r.get("id"),
                    wallet_id: r.get("wallet_id"),
                    amount: r.get("amount"),
                    entry_type: match entry_type.as_str() {
                        "COMMISSION" => EntryType::Commission,
                        "COMMISSION_PAYOUT" => EntryType::CommissionPayout,
                        other => anyhow::bail!("unknown ledger entry type {other}"),
                    },
                    transaction_id: r.get("transaction_id"),
                    created_at: r.get("created_at"),
                })
            })
            .collect()
    }

    pub async fn mark_alert_sent(&self, wallet_id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE commission_wallets SET wa_last_sent = now(), updated_at = now() WHERE id = $1",
        )
        .bind(wallet_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn row_to_wallet(r: sqlx::postgres::PgRow) -> CommissionWallet {
    CommissionWallet {
        id: r.get("id"),
        client_id: r.get("client_id"),
        balance_due: r.get("balance_due"),
        warn_threshold: r.get("warn_threshold"),
        wa_last_sent: r.get("wa_last_sent"),
    }
}
