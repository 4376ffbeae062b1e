use bigdecimal::BigDecimal;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use crate::error::Result;
use crate::journal::Day;
use crate::model::Price;
use crate::pipeline::Stage;
use crate::registry::Commodity;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct NormalizedPrices(BTreeMap<Arc<Commodity>, BigDecimal>);

impl NormalizedPrices {
    pub fn get(&self, commodity: &Arc<Commodity>) -> Option<&BigDecimal> {
        self.0.get(commodity)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Arc<Commodity>, &BigDecimal)> {
        self.0.iter()
    }
}

#[derive(Debug, Default)]
pub struct PriceBook {
    graph: BTreeMap<Arc<Commodity>, BTreeMap<Arc<Commodity>, BigDecimal>>,
}

impl PriceBook {
    pub fn new() -> PriceBook {
        PriceBook::default()
    }

    pub fn insert(&mut self, price: &Price) {
        self.graph
            .entry(price.target.clone())
            .or_default()
            .insert(price.commodity.clone(), price.price.clone());
        self.graph
            .entry(price.commodity.clone())
            .or_default()
            .insert(price.target.clone(), BigDecimal::from(1) / &price.price);
    }

    pub fn normalize(&self, target: &Arc<Commodity>) -> NormalizedPrices {
        let mut normalized = BTreeMap::new();
        normalized.insert(target.clone(), BigDecimal::from(1));
        let mut queue = VecDeque::from([target.clone()]);
        while let Some(current) = queue.pop_front() {
            let factor = normalized[&current].clone();
            let Some(edges) = self.graph.get(&current) else {
                continue;
            };
            for (commodity, price) in edges {
                if normalized.contains_key(commodity) {
                    continue;
                }
                normalized.insert(commodity.clone(), price * &factor);
                queue.push_back(commodity.clone());
            }
        }
        NormalizedPrices(normalized)
    }
}

pub struct PriceUpdater {
    valuation: Option<Arc<Commodity>>,
    book: PriceBook,
}

impl PriceUpdater {
    pub fn new(valuation: Option<Arc<Commodity>>) -> PriceUpdater {
        PriceUpdater {
            valuation,
            book: PriceBook::new(),
        }
    }
}

impl Stage for PriceUpdater {
    fn process(&mut self, mut day: Day) -> Result<Vec<Day>> {
        for price in &day.prices {
            self.book.insert(price);
        }
        if let Some(target) = &self.valuation {
            day.normalized = self.book.normalize(target);
        }
        Ok(vec![day])
    }
}
