//! Shell-facing facade over the ledger and the gated population engine.
//!
//! Every successful ledger write recomputes the growth counter and hands it
//! to the gate before returning, so the engine never sees a stale target.

use crate::config::{ConfigError, GroveConfig};
use crate::engine::{PopulationEngine, PopulationPhase, ReconcileOutcome};
use crate::gate::VisibilityGate;
use crate::scene::Shell;
use chrono::NaiveDate;
use ledger_core::{parse_amount, LedgerStore, MonthKey, PolicyError, Record, ValidationError};
use ledger_econ::{derive_count, monthly_profit, total_profit, EconError};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error(transparent)]
    Econ(#[from] EconError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Point-in-time KPIs for display or logging.
#[derive(Debug, Clone, Serialize)]
pub struct TrackerSnapshot {
    pub total_profit: Decimal,
    pub growth_count: u32,
    pub materialized: u32,
    pub units_placed: usize,
    pub milestones: u32,
    pub milestone_carry: u32,
    pub phase: PopulationPhase,
    pub visible: bool,
    pub records: usize,
    pub selected_month: Option<MonthKey>,
    /// Rise frames discarded because a reset superseded them.
    pub stale_frames: u64,
}

pub struct Tracker<S: Shell> {
    store: LedgerStore,
    gate: VisibilityGate,
    shell: S,
    unit_value: Decimal,
    today: NaiveDate,
    selected: Option<MonthKey>,
    total_profit: Decimal,
    growth_count: u32,
    synced_revision: u64,
}

impl<S: Shell> Tracker<S> {
    /// `today` supplies the label month for newly spawned trees.
    pub fn new(cfg: GroveConfig, shell: S, today: NaiveDate) -> Result<Self, TrackerError> {
        cfg.validate()?;
        Ok(Self {
            store: LedgerStore::new(),
            gate: VisibilityGate::new(PopulationEngine::new(cfg.engine)?),
            shell,
            unit_value: cfg.unit_value,
            today,
            selected: None,
            total_profit: Decimal::ZERO,
            growth_count: 0,
            synced_revision: 0,
        })
    }

    pub fn add_record(
        &mut self,
        date: &str,
        income: &str,
        expense: &str,
    ) -> Result<Record, TrackerError> {
        let record = self.store.add_record(date, income, expense)?.clone();
        self.sync()?;
        Ok(record)
    }

    /// Write a month's salary. `is_first_day` must attest that today is the
    /// first day of that month.
    pub fn set_salary(
        &mut self,
        month: &str,
        amount: &str,
        is_first_day: bool,
    ) -> Result<Option<Decimal>, TrackerError> {
        let month: MonthKey = month.parse()?;
        let prev = self
            .store
            .set_salary(month, parse_amount(amount), is_first_day)?;
        self.sync()?;
        Ok(prev)
    }

    /// Compute a month's profit and render it on the shell.
    pub fn select_month(&mut self, month: &str) -> Result<Decimal, TrackerError> {
        let month: MonthKey = month.parse()?;
        let profit = monthly_profit(&self.store, month)?;
        self.selected = Some(month);
        self.shell.render_monthly_profit(month, profit);
        Ok(profit)
    }

    /// Records of the selected month, in insertion order.
    pub fn selected_records(&self) -> Vec<&Record> {
        match self.selected {
            Some(month) => self.store.records_in_month(month).collect(),
            None => Vec::new(),
        }
    }

    pub fn selected_month(&self) -> Option<MonthKey> {
        self.selected
    }

    pub fn set_observable(&mut self, visible: bool) -> Option<ReconcileOutcome> {
        self.gate.set_visible(visible, &mut self.shell)
    }

    /// Drive pending rise animations by `elapsed_ms`.
    pub fn advance(&mut self, elapsed_ms: u64) -> usize {
        self.gate.advance(elapsed_ms, &mut self.shell)
    }

    pub fn set_today(&mut self, today: NaiveDate) {
        self.today = today;
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn months(&self) -> Vec<MonthKey> {
        self.store.list_months()
    }

    /// Total profit as of the latest ledger write.
    pub fn total_profit(&self) -> Decimal {
        self.total_profit
    }

    /// Growth counter as of the latest ledger write.
    pub fn growth_count(&self) -> u32 {
        debug_assert_eq!(self.synced_revision, self.store.revision());
        self.growth_count
    }

    pub fn store(&self) -> &LedgerStore {
        &self.store
    }

    pub fn engine(&self) -> &PopulationEngine {
        self.gate.engine()
    }

    pub fn shell(&self) -> &S {
        &self.shell
    }

    pub fn shell_mut(&mut self) -> &mut S {
        &mut self.shell
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        let engine = self.gate.engine();
        TrackerSnapshot {
            total_profit: self.total_profit,
            growth_count: self.growth_count(),
            materialized: engine.materialized_count(),
            units_placed: engine.units().len(),
            milestones: engine.milestones(),
            milestone_carry: engine.state().milestone_carry,
            phase: engine.phase(),
            visible: self.gate.is_visible(),
            records: self.store.len(),
            selected_month: self.selected,
            stale_frames: engine.stale_dropped(),
        }
    }

    fn sync(&mut self) -> Result<Option<ReconcileOutcome>, TrackerError> {
        let total = total_profit(&self.store)?;
        let count = derive_count(total, self.unit_value)?;
        if count != self.growth_count {
            info!(%total, previous = self.growth_count, count, "growth counter changed");
        }
        self.total_profit = total;
        self.growth_count = count;
        self.synced_revision = self.store.revision();
        let label = MonthKey::of(self.today).month_name();
        Ok(self.gate.request(count, label, &mut self.shell))
    }
}
