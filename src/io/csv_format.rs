//! CSV format handling for replayed operations and pool output
//!
//! This module centralizes all CSV format concerns, providing:
//! - CsvRecord structure for deserialization
//! - Conversion from CSV records to [`Operation`]s
//! - Pool state output serialization
//!
//! All functions are pure (no I/O) for easy testing.
//!
//! # Input columns
//!
//! `op,owner,pool,token_a,token_b,amount,amount_b,counterparty,reference`
//!
//! Every column except `op` may be empty; each operation checks for the
//! columns it needs.

use crate::types::{LedgerError, Operation, Pool};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Write;
use std::str::FromStr;

/// CSV record structure for deserialization
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct CsvRecord {
    pub op: String,
    pub owner: Option<String>,
    pub pool: Option<String>,
    pub token_a: Option<String>,
    pub token_b: Option<String>,
    pub amount: Option<String>,
    pub amount_b: Option<String>,
    pub counterparty: Option<String>,
    pub reference: Option<String>,
}

fn required(value: Option<String>, op: &str, column: &str) -> Result<String, LedgerError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(LedgerError::invalid_operation(
            op,
            format!("missing '{}' column", column),
        )),
    }
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn decimal(value: Option<String>, op: &str, column: &str) -> Result<Decimal, LedgerError> {
    let raw = required(value, op, column)?;
    Decimal::from_str(&raw).map_err(|_| {
        LedgerError::invalid_operation(op, format!("invalid {} '{}'", column, raw))
    })
}

/// Convert a CsvRecord to an Operation
///
/// The operation name is case-insensitive. Amount signs are not checked here;
/// the engines reject non-positive amounts themselves.
pub fn convert_csv_record(record: CsvRecord) -> Result<Operation, LedgerError> {
    let op = record.op.trim().to_lowercase();
    let op = op.as_str();

    let operation = match op {
        "add_liquidity" => Operation::AddLiquidity {
            owner: required(record.owner, op, "owner")?,
            pool: required(record.pool, op, "pool")?,
            token_a: required(record.token_a, op, "token_a")?,
            token_b: required(record.token_b, op, "token_b")?,
            amount_a: decimal(record.amount, op, "amount")?,
            amount_b: decimal(record.amount_b, op, "amount_b")?,
        },
        "remove_liquidity" => Operation::RemoveLiquidity {
            owner: required(record.owner, op, "owner")?,
            pool: required(record.pool, op, "pool")?,
            shares: decimal(record.amount, op, "amount")?,
        },
        "swap" => Operation::Swap {
            owner: required(record.owner, op, "owner")?,
            from_token: required(record.token_a, op, "token_a")?,
            to_token: required(record.token_b, op, "token_b")?,
            amount_in: decimal(record.amount, op, "amount")?,
        },
        "deposit" => Operation::Deposit {
            owner: required(record.owner, op, "owner")?,
            pool: required(record.pool, op, "pool")?,
            amount: decimal(record.amount, op, "amount")?,
        },
        "withdraw" => Operation::Withdraw {
            owner: required(record.owner, op, "owner")?,
            pool: required(record.pool, op, "pool")?,
            amount: decimal(record.amount, op, "amount")?,
        },
        "send" => Operation::Send {
            sender: required(record.owner, op, "owner")?,
            recipient: required(record.counterparty, op, "counterparty")?,
            amount: decimal(record.amount, op, "amount")?,
            description: optional(record.reference),
        },
        "request" => Operation::Request {
            requester: required(record.owner, op, "owner")?,
            recipient: required(record.counterparty, op, "counterparty")?,
            amount: decimal(record.amount, op, "amount")?,
            label: required(record.reference, op, "reference")?,
        },
        "fulfill" => Operation::Fulfill {
            fulfiller: required(record.owner, op, "owner")?,
            label: required(record.reference, op, "reference")?,
        },
        "cancel" => Operation::Cancel {
            actor: required(record.owner, op, "owner")?,
            label: required(record.reference, op, "reference")?,
        },
        "escrow" => Operation::Escrow {
            buyer: required(record.owner, op, "owner")?,
            seller: required(record.counterparty, op, "counterparty")?,
            amount: decimal(record.amount, op, "amount")?,
            item: required(record.reference, op, "reference")?,
        },
        "release" => Operation::Release {
            releaser: required(record.owner, op, "owner")?,
            item: required(record.reference, op, "reference")?,
        },
        "tick" => Operation::Tick,
        "advance" => {
            let raw = required(record.amount, op, "amount")?;
            let days = raw.parse::<i64>().map_err(|_| {
                LedgerError::invalid_operation(op, format!("invalid day count '{}'", raw))
            })?;
            Operation::Advance { days }
        }
        _ => {
            return Err(LedgerError::invalid_operation(
                &record.op,
                "unknown operation",
            ))
        }
    };

    Ok(operation)
}

fn money(value: Decimal) -> String {
    format!("{:.4}", value.round_dp(4))
}

/// Write pool states to CSV format
///
/// Writes pools with columns:
/// `pool,kind,token_a,token_b,reserve_a,reserve_b,total_liquidity,total_deposits,active`.
/// Columns that do not apply to a pool's kind are left empty. Pools are sorted
/// by id for deterministic output.
pub fn write_pools_csv(pools: &[Pool], output: &mut dyn Write) -> Result<(), String> {
    use csv::Writer;

    let mut writer = Writer::from_writer(output);

    writer
        .write_record([
            "pool",
            "kind",
            "token_a",
            "token_b",
            "reserve_a",
            "reserve_b",
            "total_liquidity",
            "total_deposits",
            "active",
        ])
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;

    let mut sorted_pools = pools.to_vec();
    sorted_pools.sort_by(|a, b| a.id().cmp(b.id()));

    for pool in sorted_pools {
        let row = match &pool {
            Pool::Liquidity(p) => [
                p.id.clone(),
                pool.kind().to_string(),
                p.token_a.clone(),
                p.token_b.clone(),
                money(p.reserve_a),
                money(p.reserve_b),
                money(p.total_liquidity),
                String::new(),
                p.is_active.to_string(),
            ],
            Pool::Yield(p) => [
                p.id.clone(),
                pool.kind().to_string(),
                p.token.clone(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                money(p.total_deposits),
                p.is_active.to_string(),
            ],
        };
        writer
            .write_record(&row)
            .map_err(|e| format!("Failed to write pool record: {}", e))?;
    }

    writer
        .flush()
        .map_err(|e| format!("Failed to flush output: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LiquidityPool, YieldPool};
    use chrono::Utc;
    use rstest::rstest;

    fn record(op: &str, columns: &[(&str, &str)]) -> CsvRecord {
        let mut record = CsvRecord {
            op: op.to_string(),
            ..CsvRecord::default()
        };
        for (column, value) in columns {
            let value = Some(value.to_string());
            match *column {
                "owner" => record.owner = value,
                "pool" => record.pool = value,
                "token_a" => record.token_a = value,
                "token_b" => record.token_b = value,
                "amount" => record.amount = value,
                "amount_b" => record.amount_b = value,
                "counterparty" => record.counterparty = value,
                "reference" => record.reference = value,
                _ => panic!("Unknown column: {}", column),
            }
        }
        record
    }

    #[test]
    fn test_convert_add_liquidity() {
        let csv_record = record(
            "add_liquidity",
            &[
                ("owner", "alice"),
                ("pool", "AZR-ETH"),
                ("token_a", "AZR"),
                ("token_b", "ETH"),
                ("amount", "1000"),
                ("amount_b", " 1.5 "),
            ],
        );

        assert_eq!(
            convert_csv_record(csv_record).unwrap(),
            Operation::AddLiquidity {
                owner: "alice".to_string(),
                pool: "AZR-ETH".to_string(),
                token_a: "AZR".to_string(),
                token_b: "ETH".to_string(),
                amount_a: Decimal::from(1000),
                amount_b: Decimal::new(15, 1),
            }
        );
    }

    #[rstest]
    #[case::swap(
        record("swap", &[("owner", "bob"), ("token_a", "ETH"), ("token_b", "USDC"), ("amount", "2")]),
        Operation::Swap { owner: "bob".to_string(), from_token: "ETH".to_string(), to_token: "USDC".to_string(), amount_in: Decimal::from(2) }
    )]
    #[case::send_without_description(
        record("send", &[("owner", "bob"), ("counterparty", "carol"), ("amount", "5")]),
        Operation::Send { sender: "bob".to_string(), recipient: "carol".to_string(), amount: Decimal::from(5), description: None }
    )]
    #[case::escrow(
        record("ESCROW", &[("owner", "A"), ("counterparty", "B"), ("amount", "500"), ("reference", "X")]),
        Operation::Escrow { buyer: "A".to_string(), seller: "B".to_string(), amount: Decimal::from(500), item: "X".to_string() }
    )]
    #[case::release(
        record("release", &[("owner", "A"), ("reference", "X")]),
        Operation::Release { releaser: "A".to_string(), item: "X".to_string() }
    )]
    #[case::tick(record("tick", &[]), Operation::Tick)]
    #[case::advance(record("advance", &[("amount", "30")]), Operation::Advance { days: 30 })]
    fn test_convert_csv_record_valid(#[case] csv_record: CsvRecord, #[case] expected: Operation) {
        assert_eq!(convert_csv_record(csv_record).unwrap(), expected);
    }

    #[rstest]
    #[case::unknown_op(record("mint", &[("owner", "alice")]), "unknown operation")]
    #[case::missing_owner(record("deposit", &[("pool", "azr-staking"), ("amount", "1")]), "missing 'owner'")]
    #[case::missing_amount_b(
        record("add_liquidity", &[("owner", "a"), ("pool", "p"), ("token_a", "A"), ("token_b", "B"), ("amount", "1")]),
        "missing 'amount_b'"
    )]
    #[case::invalid_amount(record("deposit", &[("owner", "a"), ("pool", "p"), ("amount", "lots")]), "invalid amount")]
    #[case::whitespace_label(record("fulfill", &[("owner", "a"), ("reference", "  ")]), "missing 'reference'")]
    #[case::fractional_days(record("advance", &[("amount", "1.5")]), "invalid day count")]
    fn test_convert_csv_record_errors(#[case] csv_record: CsvRecord, #[case] expected_error: &str) {
        let error = convert_csv_record(csv_record).unwrap_err();
        assert!(matches!(error, LedgerError::InvalidOperation { .. }));
        assert!(
            error.to_string().contains(expected_error),
            "unexpected error: {}",
            error
        );
    }

    #[test]
    fn test_write_pools_csv() {
        let now = Utc::now();
        let mut liquidity = LiquidityPool::new(
            "AZR-ETH",
            "AZR",
            "ETH",
            Decimal::from(10100),
            Decimal::new(990128419655, 11),
            now,
        );
        liquidity.total_liquidity = Decimal::new(31622776601683, 11);
        let mut staking = YieldPool::new("azr-staking", "AZR Staking Pool", "AZR", Decimal::new(8, 2), now);
        staking.total_deposits = Decimal::from(1000);
        staking.is_active = false;

        let mut output = Vec::new();
        write_pools_csv(
            &[Pool::Yield(staking), Pool::Liquidity(liquidity)],
            &mut output,
        )
        .unwrap();

        assert_eq!(
            String::from_utf8(output).unwrap(),
            "pool,kind,token_a,token_b,reserve_a,reserve_b,total_liquidity,total_deposits,active\n\
             AZR-ETH,liquidity,AZR,ETH,10100.0000,9.9013,316.2278,,true\n\
             azr-staking,yield,AZR,,,,,1000.0000,false\n"
        );
    }

    #[test]
    fn test_write_pools_csv_empty() {
        let mut output = Vec::new();
        write_pools_csv(&[], &mut output).unwrap();
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "pool,kind,token_a,token_b,reserve_a,reserve_b,total_liquidity,total_deposits,active\n"
        );
    }
}
