#![deny(warnings)]

//! Ledger domain models for the grove finance tracker.
//!
//! This crate defines the append-only record set and the per-month salary
//! table, with validation helpers that keep the stored data trustworthy for
//! the profit aggregator.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

/// Accepted date format for record input, e.g. "2024-01-10".
pub const DATE_FORMAT: &str = "%Y-%m-%d";

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Calendar month identifier, rendered as "YYYY-MM".
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    /// Build a key from a year and a 1-based month.
    pub fn new(year: i32, month: u32) -> Result<Self, ValidationError> {
        if !(1..=12).contains(&month) {
            return Err(ValidationError::InvalidMonth(format!("{year}-{month}")));
        }
        Ok(Self { year, month })
    }

    /// Month containing `date`.
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    /// 1-based month number.
    pub fn month(&self) -> u32 {
        self.month
    }

    /// Whether `date` falls in this month.
    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    /// English month name, e.g. "January".
    pub fn month_name(&self) -> &'static str {
        MONTH_NAMES[(self.month - 1) as usize]
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthKey {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (y, m) = s
            .split_once('-')
            .ok_or_else(|| ValidationError::InvalidMonth(s.to_string()))?;
        let year: i32 = y
            .parse()
            .map_err(|_| ValidationError::InvalidMonth(s.to_string()))?;
        let month: u32 = m
            .parse()
            .map_err(|_| ValidationError::InvalidMonth(s.to_string()))?;
        MonthKey::new(year, month)
    }
}

impl TryFrom<String> for MonthKey {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MonthKey> for String {
    fn from(key: MonthKey) -> Self {
        key.to_string()
    }
}

/// Why a record was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordDefect {
    /// No date was supplied.
    MissingDate,
    /// The date text did not parse as "YYYY-MM-DD".
    UnparsableDate(String),
    /// Income or expense is below zero.
    NegativeAmount,
    /// Income and expense are both zero.
    NoFinancialEffect,
    /// Accepting the amounts would push the ledger's turnover past what a
    /// `Decimal` can hold.
    AmountTooLarge,
}

impl fmt::Display for RecordDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordDefect::MissingDate => write!(f, "date is missing"),
            RecordDefect::UnparsableDate(s) => write!(f, "date {s:?} is not YYYY-MM-DD"),
            RecordDefect::NegativeAmount => write!(f, "amounts must be non-negative"),
            RecordDefect::NoFinancialEffect => write!(f, "income and expense are both zero"),
            RecordDefect::AmountTooLarge => write!(f, "amounts exceed the ledger's capacity"),
        }
    }
}

/// Validation errors for ledger input.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// The record cannot be stored.
    #[error("invalid record: {0}")]
    InvalidRecord(RecordDefect),
    /// Month key is not "YYYY-MM" with a month in 1..=12.
    #[error("invalid month key: {0}")]
    InvalidMonth(String),
}

/// Rejections of salary writes.
#[derive(Debug, Error, PartialEq)]
pub enum PolicyError {
    /// Salaries may only be written on the first calendar day of their month.
    #[error("salary for {month} can only be set on its first day")]
    SalaryWindowClosed { month: MonthKey },
    /// Salary amounts must be non-negative.
    #[error("salary {0} is negative")]
    NegativeSalary(Decimal),
    /// The salary would push the ledger's turnover past what a `Decimal` can hold.
    #[error("salary {0} exceeds the ledger's capacity")]
    SalaryTooLarge(Decimal),
}

/// A single income/expense entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Calendar date of the entry.
    pub date: NaiveDate,
    /// Income amount (>= 0).
    pub income: Decimal,
    /// Expense amount (>= 0).
    pub expense: Decimal,
}

impl Record {
    /// Build and validate a record.
    pub fn new(date: NaiveDate, income: Decimal, expense: Decimal) -> Result<Self, ValidationError> {
        let r = Record {
            date,
            income,
            expense,
        };
        validate_record(&r)?;
        Ok(r)
    }

    /// Income minus expense.
    pub fn net(&self) -> Decimal {
        self.income - self.expense
    }

    pub fn month(&self) -> MonthKey {
        MonthKey::of(self.date)
    }
}

/// Validate a record's amounts.
pub fn validate_record(r: &Record) -> Result<(), ValidationError> {
    if r.income < Decimal::ZERO || r.expense < Decimal::ZERO {
        return Err(ValidationError::InvalidRecord(RecordDefect::NegativeAmount));
    }
    if r.income.is_zero() && r.expense.is_zero() {
        return Err(ValidationError::InvalidRecord(
            RecordDefect::NoFinancialEffect,
        ));
    }
    Ok(())
}

/// Parse a monetary text field. Missing or unparsable input counts as zero.
///
/// Scientific notation ("1e3") is accepted.
pub fn parse_amount(text: &str) -> Decimal {
    let t = text.trim();
    if t.is_empty() {
        return Decimal::ZERO;
    }
    match Decimal::from_str(t).or_else(|_| Decimal::from_scientific(t)) {
        Ok(v) => v,
        Err(e) => {
            debug!(input = t, error = %e, "unparsable amount treated as zero");
            Decimal::ZERO
        }
    }
}

/// Parse a record date in "YYYY-MM-DD" form.
pub fn parse_date(text: &str) -> Result<NaiveDate, ValidationError> {
    let t = text.trim();
    if t.is_empty() {
        return Err(ValidationError::InvalidRecord(RecordDefect::MissingDate));
    }
    NaiveDate::parse_from_str(t, DATE_FORMAT)
        .map_err(|_| ValidationError::InvalidRecord(RecordDefect::UnparsableDate(t.to_string())))
}

/// Whether `today` is the first calendar day of `month`.
pub fn is_first_day_of(today: NaiveDate, month: MonthKey) -> bool {
    today.day() == 1 && month.contains(today)
}

/// Fixed salary per calendar month. At most one entry per month.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SalaryTable(BTreeMap<MonthKey, Decimal>);

impl SalaryTable {
    pub fn get(&self, month: MonthKey) -> Option<Decimal> {
        self.0.get(&month).copied()
    }

    /// Insert or overwrite, returning the previous amount.
    pub fn insert(&mut self, month: MonthKey, amount: Decimal) -> Option<Decimal> {
        self.0.insert(month, amount)
    }

    pub fn iter(&self) -> impl Iterator<Item = (MonthKey, Decimal)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }

    /// Sum of every salary entry.
    pub fn total(&self) -> Decimal {
        self.0.values().copied().sum()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Append-only ledger: records in insertion order plus the salary table.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerStore {
    records: Vec<Record>,
    salaries: SalaryTable,
    #[serde(skip)]
    revision: u64,
}

impl LedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse form input and append a record.
    ///
    /// Missing or unparsable amounts default to zero; a record whose
    /// amounts both resolve to zero is rejected.
    pub fn add_record(
        &mut self,
        date: &str,
        income: &str,
        expense: &str,
    ) -> Result<&Record, ValidationError> {
        let date = parse_date(date)?;
        let record = Record::new(date, parse_amount(income), parse_amount(expense))?;
        self.push(record)
    }

    /// Append an already-typed record after validating it.
    pub fn push(&mut self, record: Record) -> Result<&Record, ValidationError> {
        validate_record(&record)?;
        let room = record
            .income
            .checked_add(record.expense)
            .and_then(|added| self.turnover()?.checked_add(added));
        if room.is_none() {
            return Err(ValidationError::InvalidRecord(RecordDefect::AmountTooLarge));
        }
        debug!(date = %record.date, income = %record.income, expense = %record.expense, "record added");
        self.records.push(record);
        self.revision += 1;
        Ok(&self.records[self.records.len() - 1])
    }

    /// Write the salary for `month`, overwriting any prior value.
    ///
    /// `is_first_day` is the caller's attestation that the write happens on
    /// the first calendar day of `month`.
    pub fn set_salary(
        &mut self,
        month: MonthKey,
        amount: Decimal,
        is_first_day: bool,
    ) -> Result<Option<Decimal>, PolicyError> {
        if !is_first_day {
            return Err(PolicyError::SalaryWindowClosed { month });
        }
        if amount < Decimal::ZERO {
            return Err(PolicyError::NegativeSalary(amount));
        }
        let held = self.salaries.get(month).unwrap_or(Decimal::ZERO);
        let room = self
            .turnover()
            .and_then(|t| t.checked_sub(held))
            .and_then(|t| t.checked_add(amount));
        if room.is_none() {
            return Err(PolicyError::SalaryTooLarge(amount));
        }
        let prev = self.salaries.insert(month, amount);
        self.revision += 1;
        debug!(%month, %amount, ?prev, "salary set");
        Ok(prev)
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn salaries(&self) -> &SalaryTable {
        &self.salaries
    }

    /// Distinct months present in the record set. Order is not significant.
    pub fn list_months(&self) -> Vec<MonthKey> {
        let months: BTreeSet<MonthKey> = self.records.iter().map(Record::month).collect();
        months.into_iter().collect()
    }

    /// Records dated within `month`, in insertion order.
    pub fn records_in_month(&self, month: MonthKey) -> impl Iterator<Item = &Record> + '_ {
        self.records.iter().filter(move |r| month.contains(r.date))
    }

    /// Sum of every stored amount regardless of sign: incomes, expenses and
    /// salaries. Any partial profit sum is bounded by it, so writes keep it
    /// representable. `None` once it no longer fits.
    pub fn turnover(&self) -> Option<Decimal> {
        let salaries = self
            .salaries
            .iter()
            .try_fold(Decimal::ZERO, |acc, (_, v)| acc.checked_add(v))?;
        self.records.iter().try_fold(salaries, |acc, r| {
            acc.checked_add(r.income)?.checked_add(r.expense)
        })
    }

    /// Bumped by every successful mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
