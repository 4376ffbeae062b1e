use bigdecimal::{BigDecimal, Zero};
use chrono::NaiveDate;
use std::fmt;
use std::sync::Arc;

use crate::amounts::quo_rem;
use crate::period::{series, Interval};
use crate::registry::{Account, Commodity};

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct SourceRange {
    pub path: String,
    pub start: SourceLocation,
    pub end: SourceLocation,
}

impl fmt::Display for SourceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.path, self.start.line, self.start.column)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Open {
    pub range: SourceRange,
    pub date: NaiveDate,
    pub account: Arc<Account>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Close {
    pub range: SourceRange,
    pub date: NaiveDate,
    pub account: Arc<Account>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Price {
    pub range: SourceRange,
    pub date: NaiveDate,
    pub commodity: Arc<Commodity>,
    pub target: Arc<Commodity>,
    pub price: BigDecimal,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Assertion {
    pub range: SourceRange,
    pub date: NaiveDate,
    pub account: Arc<Account>,
    pub commodity: Arc<Commodity>,
    pub expected: BigDecimal,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Lot {
    pub date: NaiveDate,
    pub label: String,
    pub price: BigDecimal,
    pub commodity: Arc<Commodity>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Posting {
    pub credit: Arc<Account>,
    pub debit: Arc<Account>,
    pub commodity: Arc<Commodity>,
    pub amount: BigDecimal,
    pub value: BigDecimal,
    pub lot: Option<Lot>,
}

impl Posting {
    pub fn new(
        credit: Arc<Account>,
        debit: Arc<Account>,
        commodity: Arc<Commodity>,
        amount: BigDecimal,
    ) -> Posting {
        let (credit, debit, amount) = if amount < BigDecimal::zero() {
            (debit, credit, -amount)
        } else {
            (credit, debit, amount)
        };
        Posting {
            credit,
            debit,
            commodity,
            amount,
            value: BigDecimal::zero(),
            lot: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Transaction {
    pub range: SourceRange,
    pub date: NaiveDate,
    pub description: String,
    pub tags: Vec<String>,
    pub postings: Vec<Posting>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Accrual {
    pub range: SourceRange,
    pub interval: Interval,
    pub t0: NaiveDate,
    pub t1: NaiveDate,
    pub account: Arc<Account>,
    pub transaction: Transaction,
}

impl Accrual {
    pub fn expand(&self) -> Vec<Transaction> {
        let template = &self.transaction;
        let posting = &template.postings[0];

        let mut credit_single = self.account.clone();
        let mut debit_single = self.account.clone();
        let mut credit_multi = self.account.clone();
        let mut debit_multi = self.account.clone();
        match (
            posting.credit.is_asset_or_liability(),
            posting.credit.is_income_or_expense(),
            posting.debit.is_asset_or_liability(),
            posting.debit.is_income_or_expense(),
        ) {
            (true, _, _, true) => {
                credit_single = posting.credit.clone();
                debit_multi = posting.debit.clone();
            }
            (_, true, true, _) => {
                credit_multi = posting.credit.clone();
                debit_single = posting.debit.clone();
            }
            (_, true, _, true) => {
                credit_multi = posting.credit.clone();
                debit_multi = posting.debit.clone();
            }
            _ => {
                credit_single = posting.credit.clone();
                debit_single = posting.debit.clone();
            }
        }

        let points = series(self.t0, self.t1, self.interval);
        let dates = &points[1..];
        let (part, remainder) = quo_rem(&posting.amount, dates.len() as i64);

        let mut result = Vec::new();
        if credit_multi != debit_multi {
            for (i, date) in dates.iter().enumerate() {
                let mut amount = part.clone();
                if i == 0 {
                    amount += &remainder;
                }
                result.push(Transaction {
                    range: template.range.clone(),
                    date: *date,
                    description: format!(
                        "{} (accrual {}/{})",
                        template.description,
                        i + 1,
                        dates.len()
                    ),
                    tags: template.tags.clone(),
                    postings: vec![Posting::new(
                        credit_multi.clone(),
                        debit_multi.clone(),
                        posting.commodity.clone(),
                        amount,
                    )],
                });
            }
        }
        if credit_single != debit_single {
            result.push(Transaction {
                range: template.range.clone(),
                date: template.date,
                description: template.description.clone(),
                tags: template.tags.clone(),
                postings: vec![Posting::new(
                    credit_single,
                    debit_single,
                    posting.commodity.clone(),
                    posting.amount.clone(),
                )],
            });
        }
        result
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Directive {
    Open(Open),
    Close(Close),
    Price(Price),
    Transaction(Transaction),
    Assertion(Assertion),
    Accrual(Accrual),
}

impl Directive {
    pub fn date(&self) -> NaiveDate {
        match self {
            Directive::Open(d) => d.date,
            Directive::Close(d) => d.date,
            Directive::Price(d) => d.date,
            Directive::Transaction(d) => d.date,
            Directive::Assertion(d) => d.date,
            Directive::Accrual(d) => d.transaction.date,
        }
    }

    pub fn range(&self) -> &SourceRange {
        match self {
            Directive::Open(d) => &d.range,
            Directive::Close(d) => &d.range,
            Directive::Price(d) => &d.range,
            Directive::Transaction(d) => &d.range,
            Directive::Assertion(d) => &d.range,
            Directive::Accrual(d) => &d.range,
        }
    }
}

impl fmt::Display for Open {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} open {}", self.date.format("%Y-%m-%d"), self.account)
    }
}

impl fmt::Display for Close {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} close {}", self.date.format("%Y-%m-%d"), self.account)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} price {} {} {}",
            self.date.format("%Y-%m-%d"),
            self.commodity,
            self.price,
            self.target
        )
    }
}

impl fmt::Display for Assertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} balance {} {} {}",
            self.date.format("%Y-%m-%d"),
            self.account,
            self.expected,
            self.commodity
        )
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} \"{}\"", self.date.format("%Y-%m-%d"), self.description)?;
        for tag in &self.tags {
            write!(f, " #{}", tag)?;
        }
        for posting in &self.postings {
            write!(
                f,
                "\n{}  {}  {}  {}",
                posting.credit, posting.debit, posting.amount, posting.commodity
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for Accrual {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "@accrue {} {} {} {}",
            self.interval,
            self.t0.format("%Y-%m-%d"),
            self.t1.format("%Y-%m-%d"),
            self.account
        )?;
        self.transaction.fmt(f)
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Directive::Open(d) => d.fmt(f),
            Directive::Close(d) => d.fmt(f),
            Directive::Price(d) => d.fmt(f),
            Directive::Transaction(d) => d.fmt(f),
            Directive::Assertion(d) => d.fmt(f),
            Directive::Accrual(d) => d.fmt(f),
        }
    }
}
