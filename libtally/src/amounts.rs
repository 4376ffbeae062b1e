use bigdecimal::{BigDecimal, Zero};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::registry::{Account, Commodity};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Position {
    pub account: Arc<Account>,
    pub commodity: Arc<Commodity>,
}

impl Position {
    pub fn new(account: Arc<Account>, commodity: Arc<Commodity>) -> Position {
        Position { account, commodity }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Amounts(BTreeMap<Position, BigDecimal>);

impl Amounts {
    pub fn new() -> Amounts {
        Amounts::default()
    }

    pub fn get(&self, account: &Arc<Account>, commodity: &Arc<Commodity>) -> BigDecimal {
        self.0
            .get(&Position::new(account.clone(), commodity.clone()))
            .cloned()
            .unwrap_or_else(BigDecimal::zero)
    }

    pub fn add(&mut self, position: Position, quantity: &BigDecimal) {
        *self.0.entry(position).or_insert_with(BigDecimal::zero) += quantity;
    }

    pub fn book(
        &mut self,
        credit: &Arc<Account>,
        debit: &Arc<Account>,
        commodity: &Arc<Commodity>,
        quantity: &BigDecimal,
    ) {
        self.add(
            Position::new(credit.clone(), commodity.clone()),
            &-quantity.clone(),
        );
        self.add(Position::new(debit.clone(), commodity.clone()), quantity);
    }

    pub fn minus(&mut self, other: &Amounts) {
        for (position, quantity) in &other.0 {
            self.add(position.clone(), &-quantity.clone());
        }
    }

    pub fn prune_account(&mut self, account: &Arc<Account>) {
        self.0.retain(|position, _| position.account != *account);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Position, &BigDecimal)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

pub fn quo_rem(quantity: &BigDecimal, n: i64) -> (BigDecimal, BigDecimal) {
    let divisor = BigDecimal::from(n);
    let part = (quantity / &divisor).with_scale_round(1, bigdecimal::RoundingMode::Down);
    let remainder = quantity - &part * &divisor;
    (part, remainder)
}
