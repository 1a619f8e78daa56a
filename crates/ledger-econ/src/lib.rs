#![deny(warnings)]

//! Profit aggregation and growth counter derivation.
//!
//! Everything here is a pure function over a `LedgerStore` snapshot; nothing
//! is cached, so callers re-derive after every ledger mutation. Sums use
//! checked arithmetic: a store whose turnover fits in a `Decimal` never
//! overflows, but a deserialized one may.

use ledger_core::{LedgerStore, MonthKey, Record};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::trace;

/// Profit represented by one growth unit.
pub const UNIT_VALUE: Decimal = Decimal::ONE_HUNDRED;

/// Errors produced by the growth counter helpers.
#[derive(Debug, Error, PartialEq)]
pub enum EconError {
    /// Unit value must be strictly positive.
    #[error("unit value must be > 0, got {0}")]
    InvalidUnitValue(Decimal),
    /// A profit sum does not fit in a `Decimal`.
    #[error("profit overflowed")]
    Overflow,
}

fn checked_sum<I: IntoIterator<Item = Decimal>>(values: I) -> Result<Decimal, EconError> {
    values
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, v| acc.checked_add(v))
        .ok_or(EconError::Overflow)
}

fn net(r: &Record) -> Result<Decimal, EconError> {
    r.income.checked_sub(r.expense).ok_or(EconError::Overflow)
}

/// Sum of (income - expense) over all records plus every salary entry.
pub fn total_profit(store: &LedgerStore) -> Result<Decimal, EconError> {
    let nets = store.records().iter().map(net).collect::<Result<Vec<_>, _>>()?;
    let salaries = store.salaries().iter().map(|(_, v)| v);
    checked_sum(nets.into_iter().chain(salaries))
}

/// Profit for one month: its records' net plus that month's salary (0 if absent).
///
/// Example:
/// a single record of 500 income / 100 expense in 2024-01 yields 400.
pub fn monthly_profit(store: &LedgerStore, month: MonthKey) -> Result<Decimal, EconError> {
    let nets = store
        .records_in_month(month)
        .map(net)
        .collect::<Result<Vec<_>, _>>()?;
    checked_sum(nets.into_iter().chain(store.salaries().get(month)))
}

/// Profit per month for every month that has records or a salary entry.
pub fn profit_by_month(store: &LedgerStore) -> Result<BTreeMap<MonthKey, Decimal>, EconError> {
    let mut out: BTreeMap<MonthKey, Decimal> = BTreeMap::new();
    let mut add = |month: MonthKey, amount: Decimal| -> Result<(), EconError> {
        let slot = out.entry(month).or_insert(Decimal::ZERO);
        *slot = slot.checked_add(amount).ok_or(EconError::Overflow)?;
        Ok(())
    };
    for r in store.records() {
        add(r.month(), net(r)?)?;
    }
    for (month, amount) in store.salaries().iter() {
        add(month, amount)?;
    }
    Ok(out)
}

/// `max(0, floor(profit / unit_value))`, saturating at `u32::MAX`.
pub fn derive_count(profit: Decimal, unit_value: Decimal) -> Result<u32, EconError> {
    if unit_value <= Decimal::ZERO {
        return Err(EconError::InvalidUnitValue(unit_value));
    }
    let count = match profit.checked_div(unit_value) {
        Some(q) if q.floor() <= Decimal::ZERO => 0,
        Some(q) => q.floor().to_u32().unwrap_or(u32::MAX),
        // The quotient left the Decimal range; its sign is the profit's.
        None if profit > Decimal::ZERO => u32::MAX,
        None => 0,
    };
    trace!(%profit, %unit_value, count, "growth count derived");
    Ok(count)
}

/// Growth counter with the default [`UNIT_VALUE`].
pub fn growth_count(profit: Decimal) -> u32 {
    // UNIT_VALUE is positive so this cannot fail.
    derive_count(profit, UNIT_VALUE).unwrap_or(0)
}

/// Render a profit with two decimal places, e.g. "1400.00".
pub fn format_profit(profit: Decimal) -> String {
    format!(
        "{:.2}",
        profit.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    )
}
