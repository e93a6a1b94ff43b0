//! Peer-to-peer payments, payment requests and escrow
//!
//! The `PaymentLedger` records transfers between owners. Balances are not
//! tracked here; a transfer is a write-once record and settlement belongs to
//! the surrounding application.
//!
//! # Escrow
//!
//! An escrow hold is a payment transaction with `escrow_item` set and status
//! `Pending`. Either party may release it, which flips it to `Completed`
//! exactly once. The check and the flip run under the transaction's record
//! lock, so two concurrent releases cannot both succeed.

use crate::core::amm::mul;
use crate::core::store::Ledger;
use crate::core::traits::{Clock, RecordStore};
use crate::types::{
    LedgerError, PaymentRequest, PaymentStatus, PaymentTransaction, RecordId, RequestStatus,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Default transfer fee: 0.1%
pub const DEFAULT_FEE_RATE: Decimal = Decimal::from_parts(1, 0, 0, false, 3);

/// Handle returned when funds are placed in escrow
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EscrowHandle {
    pub escrow_id: RecordId,
    pub buyer: String,
    pub seller: String,
    pub amount: Decimal,
    pub item_id: String,
    pub status: PaymentStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EscrowRelease {
    pub escrow_id: RecordId,
    pub released_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FulfillReceipt {
    pub request_id: RecordId,

    /// Completed payment from the fulfiller to the requester
    pub payment: PaymentTransaction,

    pub fulfilled_at: DateTime<Utc>,
}

/// Direction of a transaction relative to one owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Sent,
    Received,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionEntry {
    pub direction: Direction,
    pub counterparty: String,
    pub transaction: PaymentTransaction,
}

/// Requests an owner has made, and pending requests addressed to them
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RequestListing {
    pub sent: Vec<PaymentRequest>,
    pub received: Vec<PaymentRequest>,
}

/// Payment totals for one owner
///
/// Counts and totals cover every transaction that has not failed, escrow
/// holds included.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PaymentStats {
    pub sent_count: usize,
    pub received_count: usize,
    pub total_sent: Decimal,
    pub total_received: Decimal,
    pub pending_requests: usize,

    /// `total_received - total_sent`
    pub net_balance: Decimal,
}

/// Transfer, request and escrow ledger
#[derive(Clone)]
pub struct PaymentLedger {
    ledger: Arc<Ledger>,
    clock: Arc<dyn Clock>,
    fee_rate: Decimal,
}

/// Correlation tag `tx_<millis>_<9 chars>`
fn transaction_hash(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("tx_{}_{}", now.timestamp_millis(), &suffix[..9])
}

impl PaymentLedger {
    pub fn new(ledger: Arc<Ledger>, clock: Arc<dyn Clock>, fee_rate: Decimal) -> Self {
        PaymentLedger {
            ledger,
            clock,
            fee_rate,
        }
    }

    pub fn fee_rate(&self) -> Decimal {
        self.fee_rate
    }

    /// Record a completed transfer from `sender` to `recipient`
    ///
    /// # Errors
    ///
    /// Returns `InvalidAmount` if `amount` is zero or negative.
    pub fn send_payment(
        &self,
        sender: &str,
        recipient: &str,
        amount: Decimal,
        description: Option<String>,
    ) -> Result<PaymentTransaction, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::invalid_amount("send_payment", amount));
        }

        let now = self.clock.now();
        let transaction = PaymentTransaction {
            id: self.ledger.next_id(),
            sender: sender.to_string(),
            recipient: recipient.to_string(),
            amount,
            fee: mul(amount, self.fee_rate, "send_payment")?,
            description,
            status: PaymentStatus::Completed,
            transaction_hash: Some(transaction_hash(now)),
            escrow_item: None,
            created_at: now,
            completed_at: Some(now),
        };
        self.ledger.payments.insert(transaction.clone());

        info!(
            sender,
            recipient,
            amount = %amount,
            fee = %transaction.fee,
            payment = transaction.id,
            "Payment sent"
        );
        Ok(transaction)
    }

    /// Ask `recipient` to pay `requester`
    pub fn request_payment(
        &self,
        requester: &str,
        recipient: &str,
        amount: Decimal,
        description: &str,
    ) -> Result<PaymentRequest, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::invalid_amount("request_payment", amount));
        }

        let request = PaymentRequest {
            id: self.ledger.next_id(),
            requester: requester.to_string(),
            recipient: recipient.to_string(),
            amount,
            description: description.to_string(),
            status: RequestStatus::Pending,
            payment_id: None,
            created_at: self.clock.now(),
            fulfilled_at: None,
        };
        self.ledger.requests.insert(request.clone());

        info!(requester, recipient, amount = %amount, request = request.id, "Payment requested");
        Ok(request)
    }

    /// Pay a pending request addressed to `fulfiller`
    ///
    /// The payment and the status change happen under the request's lock: the
    /// request is fulfilled at most once, and stays pending if the payment
    /// fails.
    ///
    /// # Errors
    ///
    /// Returns `RequestNotFound` unless a pending request with this id is
    /// addressed to `fulfiller`.
    pub fn fulfill_payment_request(
        &self,
        fulfiller: &str,
        request_id: RecordId,
    ) -> Result<FulfillReceipt, LedgerError> {
        let receipt = self
            .ledger
            .requests
            .update(&request_id, |request| {
                if request.recipient != fulfiller || request.status != RequestStatus::Pending {
                    return Err(LedgerError::request_not_found(request_id, fulfiller));
                }

                let payment = self.send_payment(
                    fulfiller,
                    &request.requester,
                    request.amount,
                    Some(format!("Payment for: {}", request.description)),
                )?;
                let fulfilled_at = payment.created_at;

                request.status = RequestStatus::Fulfilled;
                request.fulfilled_at = Some(fulfilled_at);
                request.payment_id = Some(payment.id);

                Ok(FulfillReceipt {
                    request_id,
                    payment,
                    fulfilled_at,
                })
            })
            .unwrap_or_else(|| Err(LedgerError::request_not_found(request_id, fulfiller)))?;

        info!(fulfiller, request = request_id, payment = receipt.payment.id, "Payment request fulfilled");
        Ok(receipt)
    }

    /// Cancel a pending request; the requester or the recipient may cancel
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No request has this id (`RequestNotFound`)
    /// - The request is no longer pending (`AlreadyProcessed`)
    /// - `actor` is neither requester nor recipient (`Unauthorized`)
    pub fn cancel_payment_request(
        &self,
        actor: &str,
        request_id: RecordId,
    ) -> Result<PaymentRequest, LedgerError> {
        let request = self
            .ledger
            .requests
            .update(&request_id, |request| {
                if request.status != RequestStatus::Pending {
                    return Err(LedgerError::already_processed(
                        "Payment request",
                        request_id,
                        request.status,
                    ));
                }
                if actor != request.requester && actor != request.recipient {
                    return Err(LedgerError::unauthorized(actor, "cancel request", request_id));
                }

                request.status = RequestStatus::Cancelled;
                Ok(request.clone())
            })
            .unwrap_or_else(|| Err(LedgerError::request_not_found(request_id, actor)))?;

        info!(actor, request = request_id, "Payment request cancelled");
        Ok(request)
    }

    /// Hold `amount` from `buyer` for `seller` until released
    pub fn create_escrow_payment(
        &self,
        buyer: &str,
        seller: &str,
        amount: Decimal,
        item_id: &str,
    ) -> Result<EscrowHandle, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::invalid_amount("create_escrow_payment", amount));
        }

        let transaction = PaymentTransaction {
            id: self.ledger.next_id(),
            sender: buyer.to_string(),
            recipient: seller.to_string(),
            amount,
            fee: Decimal::ZERO,
            description: Some(format!("Escrow payment for item {}", item_id)),
            status: PaymentStatus::Pending,
            transaction_hash: None,
            escrow_item: Some(item_id.to_string()),
            created_at: self.clock.now(),
            completed_at: None,
        };
        let escrow_id = transaction.id;
        self.ledger.payments.insert(transaction);

        info!(buyer, seller, amount = %amount, item = item_id, escrow = escrow_id, "Escrow created");
        Ok(EscrowHandle {
            escrow_id,
            buyer: buyer.to_string(),
            seller: seller.to_string(),
            amount,
            item_id: item_id.to_string(),
            status: PaymentStatus::Pending,
        })
    }

    /// Release a held escrow to the seller
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No escrow has this id (`EscrowNotFound`)
    /// - The escrow is no longer pending (`AlreadyProcessed`)
    /// - `releaser` is neither buyer nor seller (`Unauthorized`)
    pub fn release_escrow_payment(
        &self,
        escrow_id: RecordId,
        releaser: &str,
    ) -> Result<EscrowRelease, LedgerError> {
        let now = self.clock.now();
        let result = self
            .ledger
            .payments
            .update(&escrow_id, |transaction| {
                if !transaction.is_escrow() {
                    return Err(LedgerError::escrow_not_found(escrow_id));
                }
                if transaction.status != PaymentStatus::Pending {
                    return Err(LedgerError::already_processed(
                        "Escrow payment",
                        escrow_id,
                        transaction.status,
                    ));
                }
                if releaser != transaction.sender && releaser != transaction.recipient {
                    return Err(LedgerError::unauthorized(releaser, "release escrow", escrow_id));
                }

                transaction.status = PaymentStatus::Completed;
                transaction.completed_at = Some(now);
                Ok(EscrowRelease {
                    escrow_id,
                    released_at: now,
                })
            })
            .unwrap_or_else(|| Err(LedgerError::escrow_not_found(escrow_id)));

        match &result {
            Ok(_) => info!(releaser, escrow = escrow_id, "Escrow released"),
            Err(LedgerError::Unauthorized { .. }) => {
                warn!(releaser, escrow = escrow_id, "Unauthorized escrow release attempt")
            }
            Err(_) => {}
        }
        result
    }

    pub fn get_stats(&self, owner: &str) -> PaymentStats {
        let mut stats = PaymentStats::default();

        for tx in self.ledger.payments.find(|tx| {
            tx.status != PaymentStatus::Failed && (tx.sender == owner || tx.recipient == owner)
        }) {
            if tx.sender == owner {
                stats.sent_count += 1;
                stats.total_sent = stats.total_sent.saturating_add(tx.amount);
            }
            if tx.recipient == owner {
                stats.received_count += 1;
                stats.total_received = stats.total_received.saturating_add(tx.amount);
            }
        }

        stats.pending_requests = self
            .ledger
            .requests
            .find(|r| r.recipient == owner && r.status == RequestStatus::Pending)
            .len();
        stats.net_balance = stats.total_received.saturating_sub(stats.total_sent);
        stats
    }

    /// Transactions an owner sent or received, newest first
    pub fn list_transactions(&self, owner: &str, limit: usize) -> Vec<TransactionEntry> {
        let mut transactions = self
            .ledger
            .payments
            .find(|tx| tx.sender == owner || tx.recipient == owner);
        transactions.sort_by(|a, b| b.id.cmp(&a.id));
        transactions.truncate(limit);

        transactions
            .into_iter()
            .map(|transaction| {
                let (direction, counterparty) = if transaction.sender == owner {
                    (Direction::Sent, transaction.recipient.clone())
                } else {
                    (Direction::Received, transaction.sender.clone())
                };
                TransactionEntry {
                    direction,
                    counterparty,
                    transaction,
                }
            })
            .collect()
    }

    pub fn list_requests(&self, owner: &str) -> RequestListing {
        let newest_first = |mut requests: Vec<PaymentRequest>| {
            requests.sort_by(|a, b| b.id.cmp(&a.id));
            requests
        };

        RequestListing {
            sent: newest_first(self.ledger.requests.find(|r| r.requester == owner)),
            received: newest_first(self.ledger.requests.find(|r| {
                r.recipient == owner && r.status == RequestStatus::Pending
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use rstest::rstest;

    fn payments() -> (Arc<Ledger>, PaymentLedger) {
        let ledger = Arc::new(Ledger::new());
        let payments = PaymentLedger::new(
            Arc::clone(&ledger),
            Arc::new(ManualClock::at_epoch()),
            DEFAULT_FEE_RATE,
        );
        (ledger, payments)
    }

    #[test]
    fn test_send_payment_charges_fee_and_tags() {
        let (ledger, payments) = payments();

        let tx = payments
            .send_payment("alice", "bob", Decimal::from(250), Some("rent".to_string()))
            .unwrap();

        assert_eq!(tx.fee, Decimal::new(25, 2));
        assert_eq!(tx.status, PaymentStatus::Completed);
        let hash = tx.transaction_hash.unwrap();
        let parts: Vec<_> = hash.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "tx");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 9);
        assert_eq!(ledger.payments.len(), 1);
    }

    #[rstest]
    #[case::zero(Decimal::ZERO)]
    #[case::negative(Decimal::new(-5, 0))]
    fn test_non_positive_amounts_are_rejected(#[case] amount: Decimal) {
        let (ledger, payments) = payments();

        assert!(matches!(
            payments.send_payment("alice", "bob", amount, None),
            Err(LedgerError::InvalidAmount { .. })
        ));
        assert!(matches!(
            payments.request_payment("alice", "bob", amount, "lunch"),
            Err(LedgerError::InvalidAmount { .. })
        ));
        assert!(matches!(
            payments.create_escrow_payment("alice", "bob", amount, "item-1"),
            Err(LedgerError::InvalidAmount { .. })
        ));
        assert!(ledger.payments.is_empty());
        assert!(ledger.requests.is_empty());
    }

    #[test]
    fn test_fulfill_request_pays_requester_once() {
        let (ledger, payments) = payments();
        let request = payments
            .request_payment("alice", "bob", Decimal::from(40), "lunch")
            .unwrap();

        let receipt = payments.fulfill_payment_request("bob", request.id).unwrap();

        assert_eq!(receipt.payment.sender, "bob");
        assert_eq!(receipt.payment.recipient, "alice");
        assert_eq!(receipt.payment.description.as_deref(), Some("Payment for: lunch"));
        let stored = ledger.requests.get(&request.id).unwrap();
        assert_eq!(stored.status, RequestStatus::Fulfilled);
        assert_eq!(stored.payment_id, Some(receipt.payment.id));
        assert!(stored.fulfilled_at.is_some());

        let again = payments.fulfill_payment_request("bob", request.id);
        assert!(matches!(again, Err(LedgerError::RequestNotFound { .. })));
        assert_eq!(ledger.payments.len(), 1);
    }

    #[test]
    fn test_fulfill_by_wrong_party_leaves_request_pending() {
        let (ledger, payments) = payments();
        let request = payments
            .request_payment("alice", "bob", Decimal::from(40), "lunch")
            .unwrap();

        let result = payments.fulfill_payment_request("carol", request.id);

        assert!(matches!(result, Err(LedgerError::RequestNotFound { .. })));
        assert_eq!(ledger.requests.get(&request.id).unwrap().status, RequestStatus::Pending);
        assert!(ledger.payments.is_empty());

        let missing = payments.fulfill_payment_request("bob", 999);
        assert!(matches!(missing, Err(LedgerError::RequestNotFound { .. })));
    }

    #[test]
    fn test_cancel_request() {
        let (_, payments) = payments();
        let request = payments
            .request_payment("alice", "bob", Decimal::from(40), "lunch")
            .unwrap();

        let result = payments.cancel_payment_request("carol", request.id);
        assert!(matches!(result, Err(LedgerError::Unauthorized { .. })));

        let cancelled = payments.cancel_payment_request("bob", request.id).unwrap();
        assert_eq!(cancelled.status, RequestStatus::Cancelled);

        let result = payments.cancel_payment_request("alice", request.id);
        assert!(matches!(result, Err(LedgerError::AlreadyProcessed { .. })));

        let result = payments.fulfill_payment_request("bob", request.id);
        assert!(matches!(result, Err(LedgerError::RequestNotFound { .. })));
    }

    #[test]
    fn test_escrow_release_by_buyer() {
        let (ledger, payments) = payments();
        let handle = payments
            .create_escrow_payment("A", "B", Decimal::from(500), "X")
            .unwrap();
        assert_eq!(handle.status, PaymentStatus::Pending);

        let result = payments.release_escrow_payment(handle.escrow_id, "C");
        assert!(matches!(result, Err(LedgerError::Unauthorized { .. })));

        payments.release_escrow_payment(handle.escrow_id, "A").unwrap();
        let stored = ledger.payments.get(&handle.escrow_id).unwrap();
        assert_eq!(stored.status, PaymentStatus::Completed);
        assert!(stored.completed_at.is_some());

        let again = payments.release_escrow_payment(handle.escrow_id, "B");
        assert!(matches!(again, Err(LedgerError::AlreadyProcessed { .. })));
    }

    #[test]
    fn test_escrow_release_unknown_or_plain_payment() {
        let (_, payments) = payments();
        let plain = payments
            .send_payment("A", "B", Decimal::from(5), None)
            .unwrap();

        assert!(matches!(
            payments.release_escrow_payment(999, "A"),
            Err(LedgerError::EscrowNotFound { .. })
        ));
        assert!(matches!(
            payments.release_escrow_payment(plain.id, "A"),
            Err(LedgerError::EscrowNotFound { .. })
        ));
    }

    #[test]
    fn test_concurrent_releases_succeed_once() {
        use std::thread;

        let (_, payments) = payments();
        let handle = payments
            .create_escrow_payment("A", "B", Decimal::from(500), "X")
            .unwrap();

        let successes: usize = (0..8)
            .map(|i| {
                let payments = payments.clone();
                let releaser = if i % 2 == 0 { "A" } else { "B" };
                thread::spawn(move || payments.release_escrow_payment(handle.escrow_id, releaser))
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|h| usize::from(h.join().unwrap().is_ok()))
            .sum();

        assert_eq!(successes, 1);
    }

    #[test]
    fn test_stats_and_listings() {
        let (_, payments) = payments();
        payments.send_payment("alice", "bob", Decimal::from(100), None).unwrap();
        payments.send_payment("bob", "alice", Decimal::from(30), None).unwrap();
        payments.create_escrow_payment("alice", "carol", Decimal::from(20), "X").unwrap();
        payments.request_payment("bob", "alice", Decimal::from(5), "coffee").unwrap();
        let fulfilled = payments
            .request_payment("carol", "alice", Decimal::from(7), "book")
            .unwrap();
        payments.fulfill_payment_request("alice", fulfilled.id).unwrap();

        let stats = payments.get_stats("alice");
        assert_eq!(stats.sent_count, 3);
        assert_eq!(stats.received_count, 1);
        assert_eq!(stats.total_sent, Decimal::from(127));
        assert_eq!(stats.total_received, Decimal::from(30));
        assert_eq!(stats.pending_requests, 1);
        assert_eq!(stats.net_balance, Decimal::from(-97));

        let history = payments.list_transactions("alice", 2);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].direction, Direction::Sent);
        assert_eq!(history[0].counterparty, "carol");
        assert!(history[0].transaction.id > history[1].transaction.id);

        let requests = payments.list_requests("alice");
        assert!(requests.sent.is_empty());
        assert_eq!(requests.received.len(), 1);
        assert_eq!(requests.received[0].description, "coffee");
    }
}
