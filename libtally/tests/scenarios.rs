use anyhow::Result;
use bigdecimal::{BigDecimal, Zero};
use chrono::NaiveDate;
use std::sync::Arc;

use libtally::booking::Booker;
use libtally::error::ErrorKind;
use libtally::journal::Journal;
use libtally::period::{Interval, Partition, Partitioner};
use libtally::pipeline::{CancellationToken, Pipeline};
use libtally::prices::PriceUpdater;
use libtally::registry::Registry;
use libtally::report::{AccountMapper, Aggregator, Filters, Key, Report};
use libtally::valuation::Valuator;
use libtally::{parse, JournalError};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

struct Run {
    valuation: Option<String>,
    interval: Interval,
    diff: bool,
    to: NaiveDate,
}

impl Run {
    fn new(to: NaiveDate) -> Run {
        Run {
            valuation: None,
            interval: Interval::Once,
            diff: false,
            to,
        }
    }

    fn valued(mut self, commodity: &str) -> Run {
        self.valuation = Some(commodity.to_string());
        self
    }

    fn interval(mut self, interval: Interval) -> Run {
        self.interval = interval;
        self
    }

    fn diff(mut self) -> Run {
        self.diff = true;
        self
    }

    fn execute(self, input: &str) -> std::result::Result<Report, JournalError> {
        let registry = Arc::new(Registry::new());
        let directives = parse(&registry, input, "scenario.tally")?;
        let mut journal = Journal::new(registry.clone());
        for directive in directives {
            journal.add(directive);
        }
        let valuation = match &self.valuation {
            Some(code) => Some(registry.commodity(code)?),
            None => None,
        };
        let from = journal.period().map(|(min, _)| min).unwrap_or(self.to);
        let partition = Partition::new(from, self.to, self.interval, 0);

        let mut pipeline = Pipeline::new(CancellationToken::new())
            .stage(PriceUpdater::new(valuation.clone()))
            .stage(Booker::new())
            .stage(Valuator::new(registry.clone(), valuation.clone()))
            .stage(Partitioner::new(partition.clone(), self.diff));
        let mut aggregator = Aggregator::new(
            valuation,
            self.valuation.is_none(),
            AccountMapper::new(registry.clone()),
            Filters::default(),
            partition,
        );
        pipeline.run(journal.into_days(), |day| aggregator.add(&day))?;
        Ok(aggregator.into_report())
    }
}

fn cell(report: &Report, account: &str, commodity: Option<&str>, at: NaiveDate) -> BigDecimal {
    let registry = Registry::new();
    let key = Key {
        account: registry.account(account).unwrap(),
        commodity: commodity.map(|code| registry.commodity(code).unwrap()),
        date: at,
    };
    report.get(&key).cloned().unwrap_or_else(BigDecimal::zero)
}

const SIMPLE_LEDGER: &str = r#"
2024-01-01 open Assets:Bank
2024-01-01 open Income:Salary

2024-01-15 "pay"
  Income:Salary  Assets:Bank  1000.00  USD
"#;

#[test]
fn test_simple_ledger_balance() -> Result<()> {
    let report = Run::new(date(2024, 1, 31)).execute(SIMPLE_LEDGER)?;

    let at = date(2024, 1, 31);
    assert_eq!(
        cell(&report, "Assets:Bank", Some("USD"), at),
        "1000.00".parse::<BigDecimal>()?
    );
    assert_eq!(
        cell(&report, "Income:Salary", Some("USD"), at),
        "-1000.00".parse::<BigDecimal>()?
    );
    assert_eq!(report.iter().count(), 2);
    Ok(())
}

#[test]
fn test_empty_journal_produces_empty_report() -> Result<()> {
    let report = Run::new(date(2024, 1, 31)).execute("")?;
    assert!(report.is_empty());
    Ok(())
}

#[test]
fn test_assertion_passes() -> Result<()> {
    let input = format!("{}2024-01-15 balance Assets:Bank 1000.00 USD\n", SIMPLE_LEDGER);
    Run::new(date(2024, 1, 31)).execute(&input)?;
    Ok(())
}

#[test]
fn test_assertion_mismatch_fails_with_source_position() {
    let input = format!("{}2024-01-15 balance Assets:Bank 1000.01 USD\n", SIMPLE_LEDGER);
    let err = Run::new(date(2024, 1, 31)).execute(&input).unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::AssertionFailed));
    // The error quotes the offending directive and its source position.
    let message = err.to_string();
    assert!(message.starts_with("scenario.tally:7:"), "got: {}", message);
    assert!(message.contains("2024-01-15 balance Assets:Bank 1000.01 USD"));
    assert!(message.contains("expected 1000.01"));
}

#[test]
fn test_valuation_adjustment_scenario() -> Result<()> {
    let input = r#"
2024-01-01 open Assets:Bank
2024-01-01 open Assets:Broker
2024-01-01 open Equity:Equity

2024-01-01 price SHR 100 USD

2024-01-01 "buy shares"
  Assets:Bank    Equity:Equity  1000  USD
  Equity:Equity  Assets:Broker  10    SHR

2024-01-02 price SHR 110 USD
"#;
    let report = Run::new(date(2024, 1, 2))
        .valued("USD")
        .interval(Interval::Days)
        .execute(input)?;

    let day1 = date(2024, 1, 1);
    let day2 = date(2024, 1, 2);
    assert_eq!(cell(&report, "Assets:Broker", None, day1), "1000".parse::<BigDecimal>()?);
    assert_eq!(cell(&report, "Assets:Broker", None, day2), "1100".parse::<BigDecimal>()?);
    assert_eq!(
        cell(&report, "Equity:Valuation", None, day2),
        "-100".parse::<BigDecimal>()?
    );
    // Everything else is unchanged between the two days.
    assert_eq!(cell(&report, "Assets:Bank", None, day1), "-1000".parse::<BigDecimal>()?);
    assert_eq!(cell(&report, "Assets:Bank", None, day2), "-1000".parse::<BigDecimal>()?);

    // Values sum to zero on every date.
    for at in [day1, day2] {
        let total: BigDecimal = report
            .iter()
            .filter(|(key, _)| key.date == at)
            .map(|(_, quantity)| quantity)
            .sum();
        assert!(total.is_zero(), "values at {} sum to {}", at, total);
    }
    Ok(())
}

#[test]
fn test_unreachable_valuation_fails() {
    let input = r#"
2024-01-01 open Assets:Bank
2024-01-01 open Expenses:Rent

2024-01-15 "rent abroad"
  Assets:Bank  Expenses:Rent  100  EUR
"#;
    let err = Run::new(date(2024, 1, 31))
        .valued("USD")
        .execute(input)
        .unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::UnreachableValuation));
}

const UNIFORM_INCOME: &str = r#"
2024-01-01 open Assets:Bank
2024-01-01 open Income:Salary

2024-01-10 "pay"
  Income:Salary  Assets:Bank  100  USD

2024-02-10 "pay"
  Income:Salary  Assets:Bank  100  USD

2024-03-10 "pay"
  Income:Salary  Assets:Bank  100  USD
"#;

#[test]
fn test_monthly_diff_partitioning() -> Result<()> {
    let report = Run::new(date(2024, 3, 31))
        .interval(Interval::Months)
        .diff()
        .execute(UNIFORM_INCOME)?;

    let endpoints = [date(2024, 1, 31), date(2024, 2, 29), date(2024, 3, 31)];
    for at in endpoints {
        assert_eq!(
            cell(&report, "Assets:Bank", Some("USD"), at),
            "100".parse::<BigDecimal>()?,
            "diff row at {}",
            at
        );
    }

    // Telescoping: the diffs sum to the cumulative balance at the end.
    let cumulative = Run::new(date(2024, 3, 31))
        .interval(Interval::Months)
        .execute(UNIFORM_INCOME)?;
    let summed: BigDecimal = endpoints
        .iter()
        .map(|&at| cell(&report, "Assets:Bank", Some("USD"), at))
        .sum();
    assert_eq!(
        summed,
        cell(&cumulative, "Assets:Bank", Some("USD"), date(2024, 3, 31))
    );
    Ok(())
}

#[test]
fn test_monthly_cumulative_partitioning() -> Result<()> {
    let report = Run::new(date(2024, 3, 31))
        .interval(Interval::Months)
        .execute(UNIFORM_INCOME)?;

    assert_eq!(
        cell(&report, "Assets:Bank", Some("USD"), date(2024, 1, 31)),
        "100".parse::<BigDecimal>()?
    );
    assert_eq!(
        cell(&report, "Assets:Bank", Some("USD"), date(2024, 2, 29)),
        "200".parse::<BigDecimal>()?
    );
    assert_eq!(
        cell(&report, "Assets:Bank", Some("USD"), date(2024, 3, 31)),
        "300".parse::<BigDecimal>()?
    );
    Ok(())
}

#[test]
fn test_accrual_scenario() -> Result<()> {
    let input = r#"
2024-01-01 open Assets:Bank
2024-01-01 open Expenses:Rent
2024-01-01 open Liabilities:Accruals

@accrue monthly 2024-01-01 2024-12-31 Liabilities:Accruals
2024-01-01 "rent"
  Assets:Bank  Expenses:Rent  1200  USD
"#;
    let report = Run::new(date(2024, 12, 31))
        .interval(Interval::Months)
        .diff()
        .execute(input)?;

    // Every month recognizes 100 of expense.
    for month in 1..=12 {
        let at = Interval::Months.end_of(date(2024, month, 1));
        assert_eq!(
            cell(&report, "Expenses:Rent", Some("USD"), at),
            "100.0".parse::<BigDecimal>()?,
            "expense in month {}",
            month
        );
    }

    // The cash left once, in January.
    assert_eq!(
        cell(&report, "Assets:Bank", Some("USD"), date(2024, 1, 31)),
        "-1200".parse::<BigDecimal>()?
    );
    assert_eq!(
        cell(&report, "Assets:Bank", Some("USD"), date(2024, 2, 29)),
        BigDecimal::zero()
    );

    // The accrual account drains to zero by year end.
    let cumulative = Run::new(date(2024, 12, 31)).execute(input)?;
    assert_eq!(
        cell(
            &cumulative,
            "Liabilities:Accruals",
            Some("USD"),
            date(2024, 12, 31)
        ),
        BigDecimal::zero()
    );
    Ok(())
}

#[test]
fn test_same_day_price_overwrite() -> Result<()> {
    let input = r#"
2024-01-01 open Assets:Bank
2024-01-01 open Assets:Broker
2024-01-01 open Equity:Equity

2024-01-01 price SHR 100 USD
2024-01-01 price SHR 105 USD

2024-01-01 "buy shares"
  Assets:Bank    Equity:Equity  1050  USD
  Equity:Equity  Assets:Broker  10    SHR
"#;
    let report = Run::new(date(2024, 1, 1))
        .valued("USD")
        .execute(input)?;

    // The later price of the day wins.
    assert_eq!(
        cell(&report, "Assets:Broker", None, date(2024, 1, 1)),
        "1050".parse::<BigDecimal>()?
    );
    Ok(())
}

#[test]
fn test_single_transaction_offsetting_positions() -> Result<()> {
    let report = Run::new(date(2024, 1, 15)).execute(SIMPLE_LEDGER)?;
    let quantities: Vec<BigDecimal> = report.iter().map(|(_, q)| q.clone()).collect();
    assert_eq!(quantities.len(), 2);
    let total: BigDecimal = quantities.iter().sum();
    assert!(total.is_zero());
    Ok(())
}
