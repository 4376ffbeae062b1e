use std::collections::HashSet;
use std::sync::Arc;

use crate::amounts::Amounts;
use crate::error::{DirectiveError, ErrorKind, Result};
use crate::journal::Day;
use crate::model::Directive;
use crate::pipeline::Stage;
use crate::registry::Account;

pub struct Booker {
    open: HashSet<Arc<Account>>,
    amounts: Amounts,
}

impl Booker {
    pub fn new() -> Booker {
        Booker {
            open: HashSet::new(),
            amounts: Amounts::new(),
        }
    }
}

impl Default for Booker {
    fn default() -> Self {
        Booker::new()
    }
}

impl Stage for Booker {
    fn process(&mut self, mut day: Day) -> Result<Vec<Day>> {
        for open in &day.openings {
            if !self.open.insert(open.account.clone()) {
                return Err(DirectiveError::new(
                    ErrorKind::AccountAlreadyOpen,
                    Directive::Open(open.clone()),
                    format!("account {} is already open", open.account),
                ));
            }
        }

        for transaction in &day.transactions {
            for posting in &transaction.postings {
                if !self.open.contains(&posting.credit) {
                    return Err(DirectiveError::new(
                        ErrorKind::AccountNotOpen,
                        Directive::Transaction(transaction.clone()),
                        format!("credit account {} is not open", posting.credit),
                    ));
                }
                if !self.open.contains(&posting.debit) {
                    return Err(DirectiveError::new(
                        ErrorKind::AccountNotOpen,
                        Directive::Transaction(transaction.clone()),
                        format!("debit account {} is not open", posting.debit),
                    ));
                }
                self.amounts.book(
                    &posting.credit,
                    &posting.debit,
                    &posting.commodity,
                    &posting.amount,
                );
            }
        }

        for assertion in &day.assertions {
            let actual = self.amounts.get(&assertion.account, &assertion.commodity);
            if actual != assertion.expected {
                return Err(DirectiveError::new(
                    ErrorKind::AssertionFailed,
                    Directive::Assertion(assertion.clone()),
                    format!(
                        "balance of {} is {} {}, expected {} {}",
                        assertion.account,
                        actual,
                        assertion.commodity,
                        assertion.expected,
                        assertion.commodity
                    ),
                ));
            }
        }

        for close in &day.closings {
            if !self.open.contains(&close.account) {
                return Err(DirectiveError::new(
                    ErrorKind::AccountNotOpen,
                    Directive::Close(close.clone()),
                    format!("account {} is not open", close.account),
                ));
            }
            for (position, quantity) in self.amounts.iter() {
                if position.account == close.account && !bigdecimal::Zero::is_zero(quantity) {
                    return Err(DirectiveError::new(
                        ErrorKind::AccountHasResidualBalance,
                        Directive::Close(close.clone()),
                        format!(
                            "account {} has a residual balance of {} {}",
                            close.account, quantity, position.commodity
                        ),
                    ));
                }
            }
            self.open.remove(&close.account);
            self.amounts.prune_account(&close.account);
        }

        day.amounts = self.amounts.clone();
        Ok(vec![day])
    }
}
