use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::amounts::Amounts;
use crate::error::Result;
use crate::model::{Assertion, Close, Directive, Open, Price, Transaction};
use crate::parser;
use crate::prices::NormalizedPrices;
use crate::registry::Registry;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Day {
    pub date: NaiveDate,
    pub openings: Vec<Open>,
    pub prices: Vec<Price>,
    pub transactions: Vec<Transaction>,
    pub assertions: Vec<Assertion>,
    pub closings: Vec<Close>,

    pub amounts: Amounts,
    pub values: Amounts,
    pub normalized: NormalizedPrices,
}

impl Day {
    pub fn new(date: NaiveDate) -> Day {
        Day {
            date,
            ..Day::default()
        }
    }
}

#[derive(Debug)]
pub struct Journal {
    registry: Arc<Registry>,
    days: BTreeMap<NaiveDate, Day>,
    min: Option<NaiveDate>,
    max: Option<NaiveDate>,
}

impl Journal {
    pub fn new(registry: Arc<Registry>) -> Journal {
        Journal {
            registry,
            days: BTreeMap::new(),
            min: None,
            max: None,
        }
    }

    pub fn from_path<P: AsRef<Path>>(registry: Arc<Registry>, path: P) -> Result<Journal> {
        let directives = parser::parse_file(&registry, path)?;
        let mut journal = Journal::new(registry);
        for directive in directives {
            journal.add(directive);
        }
        Ok(journal)
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    fn day(&mut self, date: NaiveDate) -> &mut Day {
        self.days.entry(date).or_insert_with(|| Day::new(date))
    }

    pub fn add(&mut self, directive: Directive) {
        match directive {
            Directive::Open(open) => {
                self.min = Some(self.min.map_or(open.date, |min| min.min(open.date)));
                self.touch_max(open.date);
                self.day(open.date).openings.push(open);
            }
            Directive::Close(close) => {
                self.touch_max(close.date);
                self.day(close.date).closings.push(close);
            }
            Directive::Price(price) => {
                self.touch_max(price.date);
                self.day(price.date).prices.push(price);
            }
            Directive::Transaction(transaction) => self.add_transaction(transaction),
            Directive::Assertion(assertion) => {
                self.touch_max(assertion.date);
                self.day(assertion.date).assertions.push(assertion);
            }
            Directive::Accrual(accrual) => {
                let expanded = accrual.expand();
                tracing::debug!(
                    date = %accrual.transaction.date,
                    legs = expanded.len(),
                    "expanded accrual"
                );
                for transaction in expanded {
                    self.add_transaction(transaction);
                }
            }
        }
    }

    fn add_transaction(&mut self, transaction: Transaction) {
        self.touch_max(transaction.date);
        self.day(transaction.date).transactions.push(transaction);
    }

    fn touch_max(&mut self, date: NaiveDate) {
        self.max = Some(self.max.map_or(date, |max| max.max(date)));
    }

    pub fn period(&self) -> Option<(NaiveDate, NaiveDate)> {
        match (self.min, self.max) {
            (Some(min), Some(max)) => Some((min, max)),
            _ => None,
        }
    }

    pub fn days(&self) -> impl Iterator<Item = &Day> {
        self.days.values()
    }

    pub fn into_days(self) -> impl Iterator<Item = Day> {
        self.days.into_values()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}
