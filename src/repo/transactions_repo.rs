use anyhow::Result;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::domain::transaction::{CustomerInfo, Transaction, TransactionStatus};

pub struct TransactionInput<'a> {
    pub txn_id: &'a str,
    pub client_id: Uuid,
    pub gateway_id: Uuid,
    pub amount_minor: i64,
    pub currency: &'a str,
    pub status: TransactionStatus,
    pub provider_ref: Option<&'a str>,
    pub provider_response: Option<&'a serde_json::Value>,
    pub customer: &'a CustomerInfo,
}

#[derive(Clone)]
pub struct TransactionsRepo {
    pub pool: PgPool,
}

impl TransactionsRepo {
    pub async fn insert(&self, data: &TransactionInput<'_>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO transactions (
                txn_id, client_id, gateway_id, amount_minor, currency, status,
                provider_ref, provider_response, customer_name, customer_email, customer_phone
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(data.txn_id)
        .bind(data.client_id)
        .bind(data.gateway_id)
        .bind(data.amount_minor)
        .bind(data.currency)
        .bind(data.status.as_str())
        .bind(data.provider_ref)
        .bind(data.provider_response)
        .bind(data.customer.name.as_deref())
        .bind(data.customer.email.as_deref())
        .bind(data.customer.phone.as_deref())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find(&self, txn_id: &str) -> Result<Option<Transaction>> {
        let row = sqlx::query(
            r#"
            SELECT txn_id, client_id, gateway_id, amount_minor, currency, status,
                   provider_ref, created_at
            FROM transactions
            WHERE txn_id = $1
            "#,
        )
        .bind(txn_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| {
            let status: String = r.get("status");
            Ok(Transaction {
                txn_id: r.get("txn_id"),
                client_id: r.get("client_id"),
                gateway_id: r.get("gateway_id"),
                amount_minor: r.get("amount_minor"),
                currency: r.get("currency"),
                status: TransactionStatus::parse(&status)
                    .ok_or_else(|| anyhow::anyhow!("unknown transaction status {status}"))?,
                provider_ref: r.get("provider_ref"),
                created_at: r.get("created_at"),
            })
        })
        .transpose()
    }

    /// Conditional status update that skips terminal rows. Returns whether a
    /// row actually changed; a replayed terminal webhook returns `false`,
    /// which closes the read-then-write race without a distributed lock.
    pub async fn update_status_if_not_terminal(
        &self,
        txn_id: &str,
        status: TransactionStatus,
        provider_ref: Option<&str>,
        provider_response: &serde_json::Value,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE transactions
            SET status = $2,
                provider_ref = COALESCE($3, provider_ref),
                provider_response = $4,
                updated_at = now()
            WHERE txn_id = $1
              AND status NOT IN ('paid', 'failed', 'cancelled')
            "#,
        )
        .bind(txn_id)
        .bind(status.as_str())
        .bind(provider_ref)
        .bind(provider_response)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
