use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use regex::Regex;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use libtally::booking::Booker;
use libtally::journal::Journal;
use libtally::period::{Interval, Partition, Partitioner};
use libtally::pipeline::{CancellationToken, Pipeline};
use libtally::prices::PriceUpdater;
use libtally::registry::Registry;
use libtally::report::{balance_table, AccountMapper, Aggregator, Collapse, Filters, Register};
use libtally::table::{CsvRenderer, Table, TextRenderer};
use libtally::valuation::Valuator;

#[derive(Parser, Debug)]
#[command(name = "tally", version, about = "Plain-text double-entry accounting")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute a balance sheet for a date or set of dates
    Balance(BalanceArgs),
    /// List postings day by day
    Register(RegisterArgs),
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum IntervalArg {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
    Once,
}

impl From<IntervalArg> for Interval {
    fn from(arg: IntervalArg) -> Interval {
        match arg {
            IntervalArg::Daily => Interval::Days,
            IntervalArg::Weekly => Interval::Weeks,
            IntervalArg::Monthly => Interval::Months,
            IntervalArg::Quarterly => Interval::Quarters,
            IntervalArg::Yearly => Interval::Years,
            IntervalArg::Once => Interval::Once,
        }
    }
}

#[derive(Args, Debug)]
struct BalanceArgs {
    /// The journal file
    journal: PathBuf,

    /// Start of the reporting range (defaults to the journal start)
    #[arg(long)]
    from: Option<NaiveDate>,

    /// End of the reporting range (defaults to today)
    #[arg(long)]
    to: Option<NaiveDate>,

    /// Keep only the last n periods
    #[arg(long, default_value_t = 0)]
    last: usize,

    /// Reporting period
    #[arg(long, value_enum, default_value_t = IntervalArg::Once)]
    period: IntervalArg,

    /// Valuate in the given commodity
    #[arg(long)]
    val: Option<String>,

    /// Shorten matching accounts: <level>,<regex> (repeatable)
    #[arg(long = "map")]
    map: Vec<String>,

    /// Rename matching accounts: <regex>=<replacement> (repeatable)
    #[arg(long)]
    remap: Vec<String>,

    /// Filter accounts with a regex
    #[arg(long)]
    account: Option<String>,

    /// Filter commodities with a regex
    #[arg(long)]
    commodity: Option<String>,

    /// Show differences between periods instead of cumulative balances
    #[arg(long)]
    diff: bool,

    /// Show commodities on their own rows when valuating
    #[arg(long = "show-commodities")]
    show_commodities: bool,

    /// Round to the given number of digits
    #[arg(long, default_value_t = 0)]
    digits: i64,

    /// Show numbers in units of 1000
    #[arg(long)]
    thousands: bool,

    /// Print negative numbers in color
    #[arg(long)]
    color: bool,

    /// Render as CSV
    #[arg(long)]
    csv: bool,
}

#[derive(Args, Debug)]
struct RegisterArgs {
    /// The journal file
    journal: PathBuf,

    /// Start of the reporting range (defaults to the journal start)
    #[arg(long)]
    from: Option<NaiveDate>,

    /// End of the reporting range (defaults to today)
    #[arg(long)]
    to: Option<NaiveDate>,

    /// Valuate in the given commodity
    #[arg(long)]
    val: Option<String>,

    /// Filter accounts with a regex
    #[arg(long)]
    account: Option<String>,

    /// Filter commodities with a regex
    #[arg(long)]
    commodity: Option<String>,

    /// Round to the given number of digits
    #[arg(long, default_value_t = 2)]
    digits: i64,

    /// Print negative numbers in color
    #[arg(long)]
    color: bool,

    /// Render as CSV
    #[arg(long)]
    csv: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            if err.use_stderr() {
                let _ = err.print();
                return ExitCode::from(1);
            }
            let _ = err.print();
            return ExitCode::SUCCESS;
        }
    };

    let result = match cli.command {
        Command::Balance(args) => balance(args),
        Command::Register(args) => register(args),
    };
    if let Err(err) = result {
        eprintln!("{}", err);
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn balance(args: BalanceArgs) -> Result<()> {
    let registry = Arc::new(Registry::new());
    let journal = Journal::from_path(registry.clone(), &args.journal)?;
    tracing::debug!(journal = %args.journal.display(), "journal loaded");

    let valuation = match &args.val {
        Some(code) => Some(registry.commodity(code)?),
        None => None,
    };
    let mut mapper = AccountMapper::new(registry.clone());
    for rule in &args.map {
        mapper.shorten.push(parse_mapping(rule)?);
    }
    for rule in &args.remap {
        mapper.remap.push(parse_remap(rule)?);
    }
    let filters = Filters {
        accounts: parse_filter(&args.account)?,
        commodities: parse_filter(&args.commodity)?,
    };

    let Some(partition) = partition_for(&journal, args.from, args.to, args.period.into(), args.last)
    else {
        return render(&Table::new(), args.csv, args.color, args.thousands, args.digits);
    };

    let mut pipeline = Pipeline::new(CancellationToken::new())
        .stage(PriceUpdater::new(valuation.clone()))
        .stage(Booker::new())
        .stage(Valuator::new(registry.clone(), valuation.clone()))
        .stage(Partitioner::new(partition.clone(), args.diff));
    let mut aggregator = Aggregator::new(
        valuation.clone(),
        valuation.is_none() || args.show_commodities,
        mapper,
        filters,
        partition,
    );
    pipeline.run(journal.into_days(), |day| aggregator.add(&day))?;

    let table = balance_table(&aggregator.into_report());
    render(&table, args.csv, args.color, args.thousands, args.digits)
}

fn register(args: RegisterArgs) -> Result<()> {
    let registry = Arc::new(Registry::new());
    let journal = Journal::from_path(registry.clone(), &args.journal)?;

    let valuation = match &args.val {
        Some(code) => Some(registry.commodity(code)?),
        None => None,
    };
    let filters = Filters {
        accounts: parse_filter(&args.account)?,
        commodities: parse_filter(&args.commodity)?,
    };

    let from = args.from;
    let to = args.to.unwrap_or_else(today);
    let mut pipeline = Pipeline::new(CancellationToken::new())
        .stage(PriceUpdater::new(valuation.clone()))
        .stage(Booker::new())
        .stage(Valuator::new(registry.clone(), valuation.clone()));
    let mut register = Register::new(filters, valuation.is_some());
    pipeline.run(journal.into_days(), |day| {
        if from.map_or(true, |from| day.date >= from) && day.date <= to {
            register.add(&day);
        }
        Ok(())
    })?;

    render(&register.to_table(), args.csv, args.color, false, args.digits)
}

fn partition_for(
    journal: &Journal,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    interval: Interval,
    last: usize,
) -> Option<Partition> {
    let period = journal.period();
    let from = from.or(period.map(|(min, _)| min))?;
    let to = to.unwrap_or_else(today);
    Some(Partition::new(from, to, interval, last))
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

fn render(table: &Table, csv: bool, color: bool, thousands: bool, digits: i64) -> Result<()> {
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    if csv {
        CsvRenderer.render(table, &mut out)?;
    } else {
        TextRenderer {
            color,
            thousands,
            round: digits,
        }
        .render(table, &mut out)?;
    }
    out.flush().context("failed to flush output")
}

fn parse_mapping(rule: &str) -> Result<Collapse> {
    let (level, regex) = rule
        .split_once(',')
        .ok_or_else(|| anyhow!("invalid mapping `{}', expected <level>,<regex>", rule))?;
    let level: usize = level
        .parse()
        .with_context(|| format!("invalid mapping level `{}'", level))?;
    let regex =
        Regex::new(regex).with_context(|| format!("invalid mapping regex `{}'", regex))?;
    Ok(Collapse::new(level, regex))
}

fn parse_remap(rule: &str) -> Result<(Regex, String)> {
    let (regex, replacement) = rule
        .split_once('=')
        .ok_or_else(|| anyhow!("invalid remap `{}', expected <regex>=<replacement>", rule))?;
    let regex = Regex::new(regex).with_context(|| format!("invalid remap regex `{}'", regex))?;
    Ok((regex, replacement.to_string()))
}

fn parse_filter(filter: &Option<String>) -> Result<Option<Regex>> {
    filter
        .as_ref()
        .map(|regex| Regex::new(regex).with_context(|| format!("invalid filter `{}'", regex)))
        .transpose()
}
