//! Tidewatch Demo
//!
//! A ledger of account balances receives random deposits from a writer task.
//! One observation follows a single account: deposits to other accounts are
//! irrelevant, a silent correction forces a re-fetch, and a pause in the middle
//! shows how an idle observation picks up again.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::Rng;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tidewatch_core::{
    ChangeFeed, ChangeRecord, ObserveError, ObserveResult, Snapshot, Storage, StorageObserver,
    VersionedChange,
};
use tidewatch_observe::{ObservationConfig, StorageObservation, TokioClock};

const ACCOUNTS: [&str; 3] = ["alice", "bob", "carol"];

#[derive(Clone, Debug, PartialEq)]
struct Deposit {
    account: &'static str,
    amount: i64,
}

#[derive(Clone, Debug, Default)]
struct LedgerSnapshot {
    version: u64,
    balances: HashMap<&'static str, i64>,
}

impl Snapshot for LedgerSnapshot {
    type Version = u64;
    type Change = Deposit;

    fn version(&self) -> ObserveResult<u64> {
        Ok(self.version)
    }
}

#[derive(Default)]
struct Ledger {
    snapshot: Mutex<LedgerSnapshot>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<ChangeRecord<LedgerSnapshot>>>>,
}

impl Ledger {
    fn deposit(&self, account: &'static str, amount: i64) {
        let record = {
            let mut snapshot = self.snapshot.lock();
            let old_version = snapshot.version;
            snapshot.version += 1;
            *snapshot.balances.entry(account).or_default() += amount;
            VersionedChange::new(old_version, snapshot.version, Deposit { account, amount })
        };
        self.subscribers
            .lock()
            .retain(|subscriber| subscriber.send(record.clone()).is_ok());
    }

    /// Overwrite a balance without telling anyone
    fn correct(&self, account: &'static str, balance: i64) {
        let mut snapshot = self.snapshot.lock();
        snapshot.version += 1;
        snapshot.balances.insert(account, balance);
    }

    fn balance(&self, account: &str) -> i64 {
        self.snapshot
            .lock()
            .balances
            .get(account)
            .copied()
            .unwrap_or_default()
    }
}

impl Storage for Ledger {
    type Snapshot = LedgerSnapshot;

    fn changes(&self) -> ChangeFeed<LedgerSnapshot> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }

    fn with_snapshot<T, F>(&self, body: F) -> impl Future<Output = ObserveResult<T>> + Send
    where
        T: Send + 'static,
        F: FnOnce(&LedgerSnapshot) -> ObserveResult<T> + Send + 'static,
    {
        let snapshot = self.snapshot.lock().clone();
        std::future::ready(body(&snapshot))
    }
}

/// Follows the balance of one account
struct BalanceObserver {
    account: &'static str,
}

impl StorageObserver for BalanceObserver {
    type Snapshot = LedgerSnapshot;
    type Output = i64;

    fn fetch(&self, snapshot: &LedgerSnapshot) -> ObserveResult<i64> {
        Ok(snapshot
            .balances
            .get(self.account)
            .copied()
            .unwrap_or_default())
    }

    fn is_relevant(&self, change: &Deposit) -> bool {
        change.account == self.account
    }

    fn reduce(&self, output: &mut i64, change: &Deposit) -> ObserveResult<()> {
        *output = output
            .checked_add(change.amount)
            .ok_or_else(|| ObserveError::ReduceFailed(format!("overflow on {}", self.account)))?;
        Ok(())
    }

    fn initial_value(&self) -> i64 {
        0
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Tidewatch Demo - following alice's balance");

    let ledger = Arc::new(Ledger::default());
    ledger.deposit("alice", 100);

    let config = ObservationConfig::default()
        .with_misalignment_retry_delay(Duration::from_millis(250))
        .with_reducer_retry_delay(Duration::from_millis(250));
    let observation = StorageObservation::with_config(
        BalanceObserver { account: "alice" },
        ledger.clone(),
        config,
        TokioClock,
    );

    let mut outputs = observation.outputs();
    let printer = tokio::spawn(async move {
        while let Some(balance) = outputs.next().await {
            info!(balance, "alice updated");
        }
    });

    let writer = {
        let ledger = ledger.clone();
        tokio::spawn(async move {
            for round in 0..20u32 {
                let (account, amount) = {
                    let mut rng = rand::thread_rng();
                    (ACCOUNTS[rng.gen_range(0..ACCOUNTS.len())], rng.gen_range(-20..50))
                };
                ledger.deposit(account, amount);
                if round == 12 {
                    ledger.correct("alice", 1_000);
                }
                tokio::time::sleep(Duration::from_millis(40)).await;
            }
        })
    };

    tokio::time::sleep(Duration::from_millis(300)).await;
    info!("pausing observation");
    observation.pause();
    tokio::time::sleep(Duration::from_millis(200)).await;
    info!("resuming observation");
    observation.resume().await;

    writer.await?;
    tokio::time::sleep(Duration::from_millis(500)).await;
    observation.resume().await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    info!(
        observed = ?observation.latest_output(),
        ledger = ledger.balance("alice"),
        "done"
    );

    observation.finish();
    printer.await?;
    Ok(())
}
