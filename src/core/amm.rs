//! Constant-product pricing math (`x * y = k`)
//!
//! Pure functions over `Decimal`; no pool state is read or written here.
//!
//! # Swap (exact input)
//!
//! 1. `fee = amount_in * fee_rate`
//! 2. `net_input = amount_in * (1 - fee_rate)`
//! 3. `amount_out = reserve_out * net_input / (reserve_in + net_input)`
//!
//! The full `amount_in` is added to the input reserve, so the fee stays in the
//! pool and `k` never decreases across a swap.
//!
//! # Liquidity shares
//!
//! The first depositor mints `sqrt(amount_a * amount_b)`. Later depositors mint
//! `min(amount_a / reserve_a, amount_b / reserve_b) * total_liquidity`, so no
//! one can mint more than their contribution to the scarcer side is worth.

use crate::types::LedgerError;
use rust_decimal::prelude::MathematicalOps;
use rust_decimal::Decimal;

/// Output of a swap computation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwapQuote {
    pub amount_out: Decimal,

    /// Fee charged on the input side
    pub fee: Decimal,

    /// Percentage shortfall of the actual output against the spot-price output
    pub price_impact: Decimal,
}

pub(crate) fn mul(a: Decimal, b: Decimal, operation: &str) -> Result<Decimal, LedgerError> {
    a.checked_mul(b)
        .ok_or_else(|| LedgerError::arithmetic_overflow(operation))
}

pub(crate) fn div(a: Decimal, b: Decimal, operation: &str) -> Result<Decimal, LedgerError> {
    a.checked_div(b)
        .ok_or_else(|| LedgerError::arithmetic_overflow(operation))
}

pub(crate) fn add(a: Decimal, b: Decimal, operation: &str) -> Result<Decimal, LedgerError> {
    a.checked_add(b)
        .ok_or_else(|| LedgerError::arithmetic_overflow(operation))
}

/// Shares minted for a deposit of `amount_a` / `amount_b`
///
/// Callers validate that both amounts are positive.
pub fn mint_shares(
    amount_a: Decimal,
    amount_b: Decimal,
    reserve_a: Decimal,
    reserve_b: Decimal,
    total_liquidity: Decimal,
) -> Result<Decimal, LedgerError> {
    if total_liquidity.is_zero() {
        return mul(amount_a, amount_b, "mint_shares")?
            .sqrt()
            .ok_or_else(|| LedgerError::arithmetic_overflow("mint_shares"));
    }

    // A pool with shares outstanding and an empty side cannot price a deposit.
    if reserve_a.is_zero() || reserve_b.is_zero() {
        return Err(LedgerError::arithmetic_overflow("mint_shares"));
    }

    let by_a = mul(div(amount_a, reserve_a, "mint_shares")?, total_liquidity, "mint_shares")?;
    let by_b = mul(div(amount_b, reserve_b, "mint_shares")?, total_liquidity, "mint_shares")?;
    Ok(by_a.min(by_b))
}

/// Amounts of each side returned for burning `shares`
///
/// Returns `(amount_a, amount_b)`. Burning every outstanding share returns the
/// reserves exactly.
pub fn redeem_shares(
    shares: Decimal,
    reserve_a: Decimal,
    reserve_b: Decimal,
    total_liquidity: Decimal,
) -> Result<(Decimal, Decimal), LedgerError> {
    if shares == total_liquidity {
        return Ok((reserve_a, reserve_b));
    }
    let fraction = div(shares, total_liquidity, "redeem_shares")?;
    Ok((
        mul(fraction, reserve_a, "redeem_shares")?.min(reserve_a),
        mul(fraction, reserve_b, "redeem_shares")?.min(reserve_b),
    ))
}

/// Exact-input swap against the given reserves
///
/// Does not check that `amount_out` is positive; callers decide how to reject
/// a swap that yields nothing.
pub fn quote_exact_in(
    amount_in: Decimal,
    reserve_in: Decimal,
    reserve_out: Decimal,
    fee_rate: Decimal,
) -> Result<SwapQuote, LedgerError> {
    let fee = mul(amount_in, fee_rate, "swap")?;
    let net_input = mul(amount_in, Decimal::ONE - fee_rate, "swap")?;
    let denominator = add(reserve_in, net_input, "swap")?;
    let amount_out = if denominator.is_zero() {
        Decimal::ZERO
    } else {
        div(mul(net_input, reserve_out, "swap")?, denominator, "swap")?
    };

    Ok(SwapQuote {
        amount_out,
        fee,
        price_impact: price_impact(amount_in, reserve_in, amount_out, reserve_out)?,
    })
}

/// Percentage by which `amount_out` falls short of the spot-price output
///
/// The spot output is `amount_in * reserve_out / reserve_in`, i.e. what the
/// swap would return with no fee and infinite depth.
pub fn price_impact(
    amount_in: Decimal,
    reserve_in: Decimal,
    amount_out: Decimal,
    reserve_out: Decimal,
) -> Result<Decimal, LedgerError> {
    if reserve_in.is_zero() {
        return Ok(Decimal::ZERO);
    }
    let expected = div(mul(amount_in, reserve_out, "price_impact")?, reserve_in, "price_impact")?;
    if expected.is_zero() {
        return Ok(Decimal::ZERO);
    }
    mul(
        div(expected - amount_out, expected, "price_impact")?,
        Decimal::ONE_HUNDRED,
        "price_impact",
    )
}
