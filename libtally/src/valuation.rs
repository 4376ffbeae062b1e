use bigdecimal::{BigDecimal, Zero};
use std::sync::Arc;

use crate::amounts::Amounts;
use crate::error::{DirectiveError, ErrorKind, JournalError, Result};
use crate::journal::Day;
use crate::model::{Directive, Posting, SourceRange, Transaction};
use crate::pipeline::Stage;
use crate::registry::{Commodity, Registry};

pub struct Valuator {
    registry: Arc<Registry>,
    valuation: Option<Arc<Commodity>>,
    values: Amounts,
}

impl Valuator {
    pub fn new(registry: Arc<Registry>, valuation: Option<Arc<Commodity>>) -> Valuator {
        Valuator {
            registry,
            valuation,
            values: Amounts::new(),
        }
    }

    fn posting_value(
        &self,
        day: &Day,
        transaction: &Transaction,
        posting: &Posting,
        target: &Arc<Commodity>,
    ) -> Result<BigDecimal> {
        if posting.commodity == *target {
            return Ok(posting.amount.clone());
        }
        if posting.amount.is_zero() {
            return Ok(posting.value.clone());
        }
        match day.normalized.get(&posting.commodity) {
            Some(factor) => Ok(&posting.amount * factor),
            None => Err(DirectiveError::new(
                ErrorKind::UnreachableValuation,
                Directive::Transaction(transaction.clone()),
                format!(
                    "no price found to convert {} into {}",
                    posting.commodity, target
                ),
            )),
        }
    }
}

impl Stage for Valuator {
    fn process(&mut self, mut day: Day) -> Result<Vec<Day>> {
        let Some(target) = self.valuation.clone() else {
            return Ok(vec![day]);
        };

        for ti in 0..day.transactions.len() {
            for pi in 0..day.transactions[ti].postings.len() {
                let value = {
                    let transaction = &day.transactions[ti];
                    self.posting_value(&day, transaction, &transaction.postings[pi], &target)?
                };
                let posting = &mut day.transactions[ti].postings[pi];
                posting.value = value;
                let (credit, debit, commodity, value) = (
                    posting.credit.clone(),
                    posting.debit.clone(),
                    posting.commodity.clone(),
                    posting.value.clone(),
                );
                self.values.book(&credit, &debit, &commodity, &value);
            }
        }

        let mut adjustments = Vec::new();
        for (position, amount) in day.amounts.iter() {
            if amount.is_zero() || !position.account.is_asset_or_liability() {
                continue;
            }
            let new_value = if position.commodity == target {
                amount.clone()
            } else {
                match day.normalized.get(&position.commodity) {
                    Some(factor) => amount * factor,
                    None => {
                        return Err(JournalError::UnreachablePosition {
                            date: day.date,
                            commodity: position.commodity.code().to_string(),
                            target: target.code().to_string(),
                        })
                    }
                }
            };
            let delta = &new_value - self.values.get(&position.account, &position.commodity);
            if delta.is_zero() {
                continue;
            }
            tracing::debug!(
                date = %day.date,
                account = %position.account,
                commodity = %position.commodity,
                delta = %delta,
                "valuation adjustment"
            );
            let valuation_account = self.registry.valuation_account();
            let mut posting = Posting::new(
                valuation_account.clone(),
                position.account.clone(),
                position.commodity.clone(),
                BigDecimal::zero(),
            );
            posting.value = delta.clone();
            self.values.book(
                &valuation_account,
                &position.account,
                &position.commodity,
                &delta,
            );
            adjustments.push(Transaction {
                range: SourceRange::default(),
                date: day.date,
                description: format!(
                    "Adjust value of {} in account {}",
                    position.commodity, position.account
                ),
                tags: Vec::new(),
                postings: vec![posting],
            });
        }
        day.transactions.extend(adjustments);

        day.values = self.values.clone();
        Ok(vec![day])
    }
}
