//! Transfer result types

use serde::Serialize;

use crate::ledger::Transaction;

/// Both ledger entries of a committed transfer.
///
/// `outgoing` documents the origin and references the destination;
/// `incoming` documents the destination and references the origin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferReceipt {
    pub outgoing: Transaction,
    pub incoming: Transaction,
}

impl TransferReceipt {
    pub fn into_pair(self) -> (Transaction, Transaction) {
        (self.outgoing, self.incoming)
    }
}
