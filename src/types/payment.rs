//! Payment-related types
//!
//! Peer-to-peer transfers, escrow holds and payment requests.

use super::{OwnerId, RecordId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a payment transaction
///
/// `Pending` is only ever used for escrow holds awaiting release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Completed,
    Pending,
    Failed,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Completed => write!(f, "completed"),
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Status of a payment request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Fulfilled,
    Cancelled,
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestStatus::Pending => write!(f, "pending"),
            RequestStatus::Fulfilled => write!(f, "fulfilled"),
            RequestStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A transfer between two owners
///
/// Escrow holds are payment transactions with `escrow_item` set; they start
/// `Pending` and flip to `Completed` once on release.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentTransaction {
    pub id: RecordId,
    pub sender: OwnerId,
    pub recipient: OwnerId,
    pub amount: Decimal,
    pub fee: Decimal,
    pub description: Option<String>,
    pub status: PaymentStatus,

    /// Correlation tag of the form `tx_<millis>_<suffix>`
    pub transaction_hash: Option<String>,

    /// Item held in escrow, for escrow payments only
    pub escrow_item: Option<String>,

    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl PaymentTransaction {
    pub fn is_escrow(&self) -> bool {
        self.escrow_item.is_some()
    }
}

/// A request for another owner to pay the requester
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub id: RecordId,
    pub requester: OwnerId,

    /// Owner expected to pay
    pub recipient: OwnerId,

    pub amount: Decimal,
    pub description: String,
    pub status: RequestStatus,

    /// Completed payment created at fulfilment
    pub payment_id: Option<RecordId>,

    pub created_at: DateTime<Utc>,
    pub fulfilled_at: Option<DateTime<Utc>>,
}
