#![deny(warnings)]

//! Headless CLI: replays a ledger scenario and prints the resulting KPIs.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use grove_runtime::{GroveConfig, Scene, Shell, Tracker, Unit, UnitId};
use ledger_core::{is_first_day_of, MonthKey};
use ledger_econ::format_profit;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::EnvFilter;

const DEMO_SCENARIO: &str = r#"
today: 2024-01-01
events:
  - salary: { month: "2024-01", amount: 3000 }
  - record: { date: "2024-01-05", income: 1200, expense: 300 }
  - record: { date: "2024-01-18", income: 0, expense: 450 }
  - record: { date: "2024-01-20", income: 0, expense: 0 }
  - advance: 5000
  - today: 2024-02-01
  - salary: { month: "2024-02", amount: 3000 }
  - record: { date: "2024-02-11", income: 4000, expense: 250 }
  - select: "2024-01"
  - select: "2024-02"
  - advance: 60000
"#;

#[derive(Debug, Deserialize)]
struct Scenario {
    today: NaiveDate,
    #[serde(default)]
    config: Option<GroveConfig>,
    events: Vec<Event>,
}

/// Amounts may be written as YAML numbers or strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Amount {
    Text(String),
    Number(serde_yaml::Number),
}

impl Default for Amount {
    fn default() -> Self {
        Amount::Text(String::new())
    }
}

impl Amount {
    fn text(&self) -> String {
        match self {
            Amount::Text(s) => s.clone(),
            Amount::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Event {
    Record {
        #[serde(default)]
        date: String,
        #[serde(default)]
        income: Amount,
        #[serde(default)]
        expense: Amount,
    },
    Salary {
        month: String,
        #[serde(default)]
        amount: Amount,
    },
    Select(String),
    Visible(bool),
    Advance(u64),
    Today(NaiveDate),
}

/// Shell that prints read-outs and counts scene commands.
#[derive(Debug, Default)]
struct ConsoleShell {
    spawned: u64,
    lifted: u64,
    celebrations: u32,
}

impl Scene for ConsoleShell {
    fn spawn_unit(&mut self, unit: &Unit, delay_ms: u64) {
        self.spawned += 1;
        debug!(
            id = unit.id.0,
            x = unit.position.x,
            z = unit.position.z,
            delay_ms,
            "tree planted"
        );
    }

    fn lift_unit(&mut self, _id: UnitId, _height: f32) {
        self.lifted += 1;
    }

    fn clear_all_units(&mut self) {
        info!("field cleared");
    }

    fn reseed_ground(&mut self) {}

    fn notify_milestone(&mut self, milestones: u32) {
        self.celebrations += milestones;
        println!("*** milestone reached (x{milestones}) ***");
    }
}

impl Shell for ConsoleShell {
    fn render_monthly_profit(&mut self, month: MonthKey, profit: Decimal) {
        println!("{month} profit: {}", format_profit(profit));
    }
}

struct Args {
    scenario: Option<String>,
    config: Option<String>,
    json: bool,
}

fn parse_args() -> Args {
    let mut args = Args {
        scenario: None,
        config: None,
        json: false,
    };
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--scenario" => args.scenario = it.next(),
            "--config" => args.config = it.next(),
            "--json" => args.json = true,
            _ => {}
        }
    }
    args
}

fn apply(tracker: &mut Tracker<ConsoleShell>, event: &Event) -> Result<()> {
    match event {
        Event::Record {
            date,
            income,
            expense,
        } => {
            tracker.add_record(date, &income.text(), &expense.text())?;
        }
        Event::Salary { month, amount } => {
            let first_day = month
                .parse::<MonthKey>()
                .map(|m| is_first_day_of(tracker.today(), m))
                .unwrap_or(false);
            tracker.set_salary(month, &amount.text(), first_day)?;
        }
        Event::Select(month) => {
            tracker.select_month(month)?;
        }
        Event::Visible(v) => {
            tracker.set_observable(*v);
        }
        Event::Advance(ms) => {
            tracker.advance(*ms);
        }
        Event::Today(d) => tracker.set_today(*d),
    }
    Ok(())
}

fn main() -> Result<()> {
    // Logging setup
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::DEBUG)
        .init();

    let args = parse_args();
    info!(scenario = ?args.scenario, config = ?args.config, "starting grove CLI");

    let scenario_text = match &args.scenario {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario {path}"))?,
        None => DEMO_SCENARIO.to_string(),
    };
    let scenario: Scenario =
        serde_yaml::from_str(&scenario_text).context("parsing scenario")?;
    let cfg = match &args.config {
        Some(path) => GroveConfig::load(path).with_context(|| format!("loading config {path}"))?,
        None => scenario.config.unwrap_or_default(),
    };

    let mut tracker = Tracker::new(cfg, ConsoleShell::default(), scenario.today)?;
    let mut rejected = 0usize;
    for (i, event) in scenario.events.iter().enumerate() {
        if let Err(e) = apply(&mut tracker, event) {
            rejected += 1;
            warn!(event = i, error = %e, "event rejected");
        }
    }

    let snap = tracker.snapshot();
    println!(
        "Grove {} | records: {} | months: {} | rejected: {}",
        env!("GIT_SHA"),
        snap.records,
        tracker.months().len(),
        rejected
    );
    println!(
        "KPI | profit: {} | trees: {} | placed: {} | milestones: {} | phase: {:?} | planted: {} | frames: {} | celebrations: {}",
        format_profit(snap.total_profit),
        snap.growth_count,
        snap.units_placed,
        snap.milestones,
        snap.phase,
        tracker.shell().spawned,
        tracker.shell().lifted,
        tracker.shell().celebrations
    );
    if args.json {
        println!("{}", serde_json::to_string_pretty(&snap)?);
    }
    Ok(())
}
