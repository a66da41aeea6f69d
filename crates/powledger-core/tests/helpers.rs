#![allow(dead_code)]

use powledger_core::{CancelToken, Ledger, LedgerConfig, Transaction};
use serde_json::json;

pub fn tx(id: &str) -> Transaction {
    Transaction::new(json!({ "id": id }))
}

pub fn form_tx(transaction: &str, amount: &str, customer: &str) -> Transaction {
    Transaction::new(json!({
        "transaction": transaction,
        "amount": amount,
        "customerID": customer,
    }))
}

/// A ledger at `difficulty` with `blocks` single-transaction blocks mined on top of genesis.
pub fn ledger_with_blocks(difficulty: usize, blocks: usize) -> anyhow::Result<Ledger> {
    let mut ledger = Ledger::new(LedgerConfig::default().with_difficulty(difficulty))?;
    for i in 0..blocks {
        ledger.add_transaction(tx(&format!("seed-{i}")));
        ledger
            .mine(&CancelToken::new())?
            .expect("pool was not empty");
    }
    Ok(ledger)
}
