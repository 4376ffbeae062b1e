use bigdecimal::{BigDecimal, Zero};
use chrono::NaiveDate;
use pest::iterators::Pair;
use pest::Parser;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::error::{JournalError, Result};
use crate::model::{
    Accrual, Assertion, Close, Directive, Open, Posting, Price, SourceLocation, SourceRange,
    Transaction,
};
use crate::period::Interval;
use crate::registry::Registry;

#[derive(Parser)]
#[grammar = "ledger.pest"]
pub struct LedgerParser;

pub fn parse_file<P: AsRef<Path>>(registry: &Arc<Registry>, path: P) -> Result<Vec<Directive>> {
    let path = path.as_ref();
    let input = fs::read_to_string(path)?;
    parse(registry, &input, &path.to_string_lossy())
}

pub fn parse(registry: &Arc<Registry>, input: &str, path: &str) -> Result<Vec<Directive>> {
    let pairs = LedgerParser::parse(Rule::ledger, input)
        .map_err(|e| JournalError::Parse(format!("{}: {}", path, e)))?;

    let mut directives = Vec::new();
    for pair in pairs {
        match pair.as_rule() {
            Rule::include => {
                let quoted = pair
                    .into_inner()
                    .next()
                    .ok_or_else(|| JournalError::Parse("invalid include directive".to_string()))?;
                let target = Path::new(path)
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_default()
                    .join(inner_str(quoted));
                directives.extend(parse_file(registry, target)?);
            }
            Rule::directive => directives.push(directive(registry, pair, path)?),
            Rule::EOI => break,
            _ => {
                return Err(JournalError::Parse(format!(
                    "unexpected token at `{:?}': {}",
                    pair.as_rule(),
                    pair.as_str()
                )))
            }
        }
    }
    Ok(directives)
}

pub fn inner_str(token: Pair<Rule>) -> &str {
    token.into_inner().next().unwrap().as_str()
}

fn range_of(pair: &Pair<Rule>, path: &str) -> SourceRange {
    let span = pair.as_span();
    let (start_line, start_column) = span.start_pos().line_col();
    let (end_line, end_column) = span.end_pos().line_col();
    SourceRange {
        path: path.to_string(),
        start: SourceLocation {
            line: start_line,
            column: start_column,
        },
        end: SourceLocation {
            line: end_line,
            column: end_column,
        },
    }
}

fn directive(registry: &Arc<Registry>, pair: Pair<Rule>, path: &str) -> Result<Directive> {
    let range = range_of(&pair, path);
    let mut pairs = pair.into_inner();

    let mut token = next_token(&mut pairs, "accrual or date")?;
    let accrue = if token.as_rule() == Rule::accrue {
        let accrue = token;
        token = next_token(&mut pairs, "date")?;
        Some(accrue)
    } else {
        None
    };
    let date = parse_date(token.as_str())?;

    let command = next_token(&mut pairs, "command")?;
    let parsed = match command.as_rule() {
        Rule::open => Directive::Open(Open {
            range: range.clone(),
            date,
            account: registry.account(command.into_inner().as_str())?,
        }),
        Rule::close => Directive::Close(Close {
            range: range.clone(),
            date,
            account: registry.account(command.into_inner().as_str())?,
        }),
        Rule::price => {
            let mut inner = command.into_inner();
            let commodity = registry.commodity(next_token(&mut inner, "commodity")?.as_str())?;
            let price = parse_decimal(next_token(&mut inner, "price")?.as_str())?;
            let target = registry.commodity(next_token(&mut inner, "target")?.as_str())?;
            if commodity == target {
                return Err(JournalError::Parse(format!(
                    "{}: price of {} must quote a different commodity",
                    range, commodity
                )));
            }
            if price <= BigDecimal::zero() {
                return Err(JournalError::Parse(format!(
                    "{}: price must be positive, got {}",
                    range, price
                )));
            }
            Directive::Price(Price {
                range: range.clone(),
                date,
                commodity,
                target,
                price,
            })
        }
        Rule::assertion => {
            let mut inner = command.into_inner();
            Directive::Assertion(Assertion {
                range: range.clone(),
                date,
                account: registry.account(next_token(&mut inner, "account")?.as_str())?,
                expected: parse_decimal(next_token(&mut inner, "amount")?.as_str())?,
                commodity: registry.commodity(next_token(&mut inner, "commodity")?.as_str())?,
            })
        }
        Rule::transaction => {
            Directive::Transaction(transaction(registry, command, range.clone(), date)?)
        }
        rule => {
            return Err(JournalError::Parse(format!(
                "unexpected token at `{:?}'",
                rule
            )))
        }
    };

    let Some(accrue) = accrue else {
        return Ok(parsed);
    };
    let Directive::Transaction(template) = parsed else {
        return Err(JournalError::Parse(format!(
            "{}: @accrue must precede a transaction",
            range
        )));
    };
    if template.postings.len() != 1 {
        return Err(JournalError::Parse(format!(
            "{}: an accrued transaction must have exactly one booking",
            range
        )));
    }
    let mut inner = accrue.into_inner();
    let interval: Interval = next_token(&mut inner, "interval")?
        .as_str()
        .parse()
        .map_err(JournalError::Parse)?;
    let t0 = parse_date(next_token(&mut inner, "start date")?.as_str())?;
    let t1 = parse_date(next_token(&mut inner, "end date")?.as_str())?;
    let account = registry.account(next_token(&mut inner, "account")?.as_str())?;
    Ok(Directive::Accrual(Accrual {
        range,
        interval,
        t0,
        t1,
        account,
        transaction: template,
    }))
}

fn transaction(
    registry: &Arc<Registry>,
    pair: Pair<Rule>,
    range: SourceRange,
    date: NaiveDate,
) -> Result<Transaction> {
    let mut description = String::new();
    let mut tags = Vec::new();
    let mut postings = Vec::new();
    for token in pair.into_inner() {
        match token.as_rule() {
            Rule::quoted_string => description = inner_str(token).to_string(),
            Rule::tag => tags.push(token.as_str().trim_start_matches('#').to_string()),
            Rule::booking => {
                let mut inner = token.into_inner();
                let credit = registry.account(next_token(&mut inner, "credit account")?.as_str())?;
                let debit = registry.account(next_token(&mut inner, "debit account")?.as_str())?;
                let amount = parse_decimal(next_token(&mut inner, "amount")?.as_str())?;
                let commodity =
                    registry.commodity(next_token(&mut inner, "commodity")?.as_str())?;
                postings.push(Posting::new(credit, debit, commodity, amount));
            }
            rule => {
                return Err(JournalError::Parse(format!(
                    "unexpected token at `{:?}'",
                    rule
                )))
            }
        }
    }
    Ok(Transaction {
        range,
        date,
        description,
        tags,
        postings,
    })
}

fn next_token<'a>(
    pairs: &mut pest::iterators::Pairs<'a, Rule>,
    expected: &str,
) -> Result<Pair<'a, Rule>> {
    pairs
        .next()
        .ok_or_else(|| JournalError::Parse(format!("invalid next token, expected {}", expected)))
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| JournalError::Parse(format!("invalid date `{}'", s)))
}

fn parse_decimal(s: &str) -> Result<BigDecimal> {
    s.parse()
        .map_err(|_| JournalError::Parse(format!("invalid decimal `{}'", s)))
}
