use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use anyhow::Result;
use psp_gateway::domain::wallet::CommissionWallet;
use psp_gateway::error::CoreError;
use psp_gateway::service::ledger::{CommissionLedger, WalletStore};
use uuid::Uuid;

/// Wallet store with the same semantics the SQL layer enforces: one
/// commission entry per transaction, payouts refused when the balance
/// guard fails.
#[derive(Default)]
struct InMemoryWallets {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    wallets: HashMap<Uuid, CommissionWallet>,
    booked_txns: HashSet<String>,
    entry_count: usize,
}

impl InMemoryWallets {
    fn with_wallet(client_id: Uuid, balance_due: i64) -> (Self, Uuid) {
        let store = Self::default();
        let wallet_id = Uuid::new_v4();
        store.state.lock().unwrap().wallets.insert(
            wallet_id,
            CommissionWallet {
                id: wallet_id,
                client_id,
                balance_due,
                warn_threshold: 500_000,
                wa_last_sent: None,
            },
        );
        (store, wallet_id)
    }

    fn balance(&self, wallet_id: Uuid) -> i64 {
        self.state.lock().unwrap().wallets[&wallet_id].balance_due
    }

    fn entries(&self) -> usize {
        self.state.lock().unwrap().entry_count
    }
}

#[async_trait::async_trait]
impl WalletStore for InMemoryWallets {
    async fn find_by_client(&self, client_id: Uuid) -> Result<Option<CommissionWallet>> {
        let state = self.state.lock().unwrap();
        Ok(state.wallets.values().find(|w| w.client_id == client_id).cloned())
    }

    async fn get(&self, wallet_id: Uuid) -> Result<Option<CommissionWallet>> {
        Ok(self.state.lock().unwrap().wallets.get(&wallet_id).cloned())
    }

    async fn book_commission(
        &self,
        wallet_id: Uuid,
        transaction_id: &str,
        commission_minor: i64,
    ) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        if !state.booked_txns.insert(transaction_id.to_string()) {
            return Ok(false);
        }
        state.entry_count += 1;
        state
            .wallets
            .get_mut(&wallet_id)
            .expect("wallet exists")
            .balance_due += commission_minor;
        Ok(true)
    }

    async fn book_payout(&self, wallet_id: Uuid, amount_minor: i64) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        let Some(wallet) = state.wallets.get_mut(&wallet_id) else {
            return Ok(false);
        };
        if wallet.balance_due < amount_minor {
            return Ok(false);
        }
        wallet.balance_due -= amount_minor;
        state.entry_count += 1;
        Ok(true)
    }
}

fn ledger(store: InMemoryWallets) -> CommissionLedger<InMemoryWallets> {
    CommissionLedger { wallets_repo: store }
}

#[tokio::test]
async fn duplicate_booking_writes_one_entry_and_one_increment() {
    let client_id = Uuid::new_v4();
    let (store, wallet_id) = InMemoryWallets::with_wallet(client_id, 0);
    let ledger = ledger(store);

    // 3.5% of 10000
    ledger.book(client_id, "LSP_1_AAAAAA", 10_000, 350).await.unwrap();
    // provider re-delivery of the same paid webhook
    ledger.book(client_id, "LSP_1_AAAAAA", 10_000, 350).await.unwrap();

    assert_eq!(ledger.wallets_repo.balance(wallet_id), 350);
    assert_eq!(ledger.wallets_repo.entries(), 1);
}

#[tokio::test]
async fn distinct_transactions_each_book() {
    let client_id = Uuid::new_v4();
    let (store, wallet_id) = InMemoryWallets::with_wallet(client_id, 0);
    let ledger = ledger(store);

    ledger.book(client_id, "LSP_1_AAAAAA", 10_000, 350).await.unwrap();
    ledger.book(client_id, "LSP_2_BBBBBB", 20_000, 350).await.unwrap();

    assert_eq!(ledger.wallets_repo.balance(wallet_id), 1_050);
    assert_eq!(ledger.wallets_repo.entries(), 2);
}

#[tokio::test]
async fn booking_without_a_wallet_is_not_found() {
    let ledger = ledger(InMemoryWallets::default());
    let result = ledger.book(Uuid::new_v4(), "LSP_1_AAAAAA", 10_000, 350).await;
    assert!(matches!(result, Err(CoreError::NotFound("wallet"))));
}

#[tokio::test]
async fn oversized_payout_leaves_the_balance_untouched() {
    let (store, wallet_id) = InMemoryWallets::with_wallet(Uuid::new_v4(), 5_000);
    let ledger = ledger(store);

    let result = ledger.payout(wallet_id, 5_001).await;
    assert!(matches!(result, Err(CoreError::InsufficientBalance)));
    assert_eq!(ledger.wallets_repo.balance(wallet_id), 5_000);
    assert_eq!(ledger.wallets_repo.entries(), 0);
}

#[tokio::test]
async fn full_balance_payout_zeroes_the_wallet() {
    let (store, wallet_id) = InMemoryWallets::with_wallet(Uuid::new_v4(), 5_000);
    let ledger = ledger(store);

    ledger.payout(wallet_id, 5_000).await.unwrap();
    assert_eq!(ledger.wallets_repo.balance(wallet_id), 0);
    assert_eq!(ledger.wallets_repo.entries(), 1);
}

#[tokio::test]
async fn payout_against_unknown_wallet_is_not_found() {
    let ledger = ledger(InMemoryWallets::default());
    let result = ledger.payout(Uuid::new_v4(), 1_000).await;
    assert!(matches!(result, Err(CoreError::NotFound("wallet"))));
}

#[tokio::test]
async fn non_positive_payout_is_rejected_up_front() {
    let (store, wallet_id) = InMemoryWallets::with_wallet(Uuid::new_v4(), 5_000);
    let ledger = ledger(store);
    assert!(matches!(
        ledger.payout(wallet_id, 0).await,
        Err(CoreError::Validation(_))
    ));
    assert_eq!(ledger.wallets_repo.balance(wallet_id), 5_000);
}
