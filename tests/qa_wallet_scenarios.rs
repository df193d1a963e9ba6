use std::sync::Arc;

use wallet_ledger::config::LedgerConfig;
use wallet_ledger::{
    AccountService, HistoryService, LedgerStore, MemoryStore, Money, TransactionType,
    TransferOrchestrator, WalletError,
};

/// Services wired over one in-memory store
struct Wallet {
    store: MemoryStore,
    accounts: AccountService,
    orchestrator: TransferOrchestrator,
    history: HistoryService,
}

fn wallet() -> Wallet {
    let store = MemoryStore::new();
    let shared: Arc<dyn LedgerStore> = Arc::new(store.clone());
    Wallet {
        accounts: AccountService::new(shared.clone(), &LedgerConfig::default()).unwrap(),
        orchestrator: TransferOrchestrator::new(shared.clone()),
        history: HistoryService::new(shared),
        store,
    }
}

fn pen(amount: &str) -> Money {
    Money::parse(amount, "PEN").unwrap()
}

/// Open an account and fund it with an opening deposit
async fn funded(w: &Wallet, owner: &str, balance: &str) -> String {
    let account = w.accounts.open_account(owner, None).await.unwrap();
    if pen(balance).is_positive() {
        w.orchestrator
            .deposit(account.id(), pen(balance), "opening")
            .await
            .unwrap();
    }
    account.number().to_string()
}

#[tokio::test]
async fn qa_tc_withdraw_updates_balance_and_history() {
    let w = wallet();
    let number = funded(&w, "alice", "1000.00").await;
    let id = w.orchestrator.resolve(&number).await.unwrap();

    w.orchestrator.withdraw(id, pen("300.00"), "").await.unwrap();

    assert_eq!(w.accounts.balance(&number).await.unwrap(), pen("700.00"));
    let history = w.history.history(&number).await.unwrap();
    assert_eq!(history[0].kind(), TransactionType::Withdrawal);
    assert_eq!(history[0].balance_before(), pen("1000.00"));
    assert_eq!(history[0].balance_after(), pen("700.00"));
}

#[tokio::test]
async fn qa_tc_transfer_between_accounts() {
    let w = wallet();
    let a = funded(&w, "alice", "1000.00").await;
    let b = funded(&w, "bob", "0").await;

    let receipt = w
        .orchestrator
        .transfer_by_number(&a, &b, pen("400.00"), "")
        .await
        .unwrap();

    assert_eq!(w.accounts.balance(&a).await.unwrap(), pen("600.00"));
    assert_eq!(w.accounts.balance(&b).await.unwrap(), pen("400.00"));
    assert_eq!(receipt.outgoing.kind().as_str(), "TRANSFERENCIA_SALIDA");
    assert_eq!(receipt.incoming.kind().as_str(), "TRANSFERENCIA_ENTRADA");
    assert_eq!(receipt.outgoing.description(), format!("Transfer to {}", b));
    assert_eq!(receipt.incoming.description(), format!("Transfer from {}", a));
}

#[tokio::test]
async fn qa_tc_overdraft_changes_nothing() {
    let w = wallet();
    let number = funded(&w, "alice", "100.00").await;
    let id = w.orchestrator.resolve(&number).await.unwrap();
    let entries_before = w.store.entry_count().await;

    let err = w.orchestrator.withdraw(id, pen("150.00"), "").await.unwrap_err();

    assert_eq!(err.code(), "INSUFFICIENT_FUNDS");
    assert_eq!(w.accounts.balance(&number).await.unwrap(), pen("100.00"));
    assert_eq!(w.store.entry_count().await, entries_before);
}

#[tokio::test]
async fn qa_tc_self_transfer_rejected() {
    let w = wallet();
    let number = funded(&w, "alice", "100.00").await;

    let err = w
        .orchestrator
        .transfer_by_number(&number, &number, pen("50.00"), "")
        .await
        .unwrap_err();

    assert!(matches!(err, WalletError::SameAccountTransfer(_)));
    assert_eq!(w.accounts.balance(&number).await.unwrap(), pen("100.00"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn qa_tc_racing_withdrawals_single_winner() {
    let w = Arc::new(wallet());
    let number = funded(&w, "alice", "1000.00").await;
    let id = w.orchestrator.resolve(&number).await.unwrap();

    let first = {
        let w = w.clone();
        tokio::spawn(async move { w.orchestrator.withdraw(id, pen("600.00"), "").await })
    };
    let second = {
        let w = w.clone();
        tokio::spawn(async move { w.orchestrator.withdraw(id, pen("600.00"), "").await })
    };
    let results = [first.await.unwrap(), second.await.unwrap()];

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(WalletError::InsufficientFunds { .. }))));
    assert_eq!(w.accounts.balance(&number).await.unwrap(), pen("400.00"));
    // opening deposit + the single winning withdrawal
    assert_eq!(w.history.history(&number).await.unwrap().len(), 2);
}

#[tokio::test]
async fn qa_tc_failed_transfer_write_is_rolled_back() {
    let w = wallet();
    let a = funded(&w, "alice", "1000.00").await;
    let b = funded(&w, "bob", "0").await;

    // third write = first ledger entry, after both balances were staged
    w.store.fail_nth_write(3);
    let err = w
        .orchestrator
        .transfer_by_number(&a, &b, pen("400.00"), "")
        .await
        .unwrap_err();

    assert!(matches!(err, WalletError::PersistenceFailure(_)));
    assert_eq!(w.accounts.balance(&a).await.unwrap(), pen("1000.00"));
    assert_eq!(w.accounts.balance(&b).await.unwrap(), pen("0.00"));
    assert!(w.history.history(&b).await.unwrap().is_empty());
}
