use bigdecimal::{BigDecimal, Zero};
use chrono::NaiveDate;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::error::Result;
use crate::journal::Day;
use crate::period::Partition;
use crate::registry::{Account, AccountType, Commodity, Registry};
use crate::table::{Cell, Table};

#[derive(Clone, Debug)]
pub struct Collapse {
    pub level: usize,
    pub regex: Regex,
}

impl Collapse {
    pub fn new(level: usize, regex: Regex) -> Collapse {
        Collapse { level, regex }
    }
}

pub struct AccountMapper {
    registry: Arc<Registry>,
    pub remap: Vec<(Regex, String)>,
    pub shorten: Vec<Collapse>,
}

impl AccountMapper {
    pub fn new(registry: Arc<Registry>) -> AccountMapper {
        AccountMapper {
            registry,
            remap: Vec::new(),
            shorten: Vec::new(),
        }
    }

    pub fn map(&self, account: &Arc<Account>) -> Result<Option<Arc<Account>>> {
        let mut name = account.name().to_string();
        for (regex, replacement) in &self.remap {
            if regex.is_match(&name) {
                name = regex.replace_all(&name, replacement.as_str()).into_owned();
            }
        }
        let mut segments: Vec<&str> = name.split(':').collect();
        for collapse in &self.shorten {
            if collapse.regex.is_match(&name) && segments.len() > collapse.level {
                segments.truncate(collapse.level);
            }
        }
        if segments.is_empty() || segments[0].is_empty() {
            return Ok(None);
        }
        let shortened = segments.join(":");
        if shortened == account.name() {
            return Ok(Some(account.clone()));
        }
        Ok(Some(self.registry.account(&shortened)?))
    }
}

#[derive(Debug, Default)]
pub struct Filters {
    pub accounts: Option<Regex>,
    pub commodities: Option<Regex>,
}

impl Filters {
    pub fn match_account(&self, account: &Account) -> bool {
        self.accounts
            .as_ref()
            .map_or(true, |regex| regex.is_match(account.name()))
    }

    pub fn match_commodity(&self, commodity: &Commodity) -> bool {
        self.commodities
            .as_ref()
            .map_or(true, |regex| regex.is_match(commodity.code()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Key {
    pub account: Arc<Account>,
    pub commodity: Option<Arc<Commodity>>,
    pub date: NaiveDate,
}

#[derive(Debug, Default)]
pub struct Report {
    cells: BTreeMap<Key, BigDecimal>,
}

impl Report {
    pub fn add(&mut self, key: Key, quantity: &BigDecimal) {
        *self.cells.entry(key).or_insert_with(BigDecimal::zero) += quantity;
    }

    pub fn get(&self, key: &Key) -> Option<&BigDecimal> {
        self.cells.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        let dates: BTreeSet<NaiveDate> = self.cells.keys().map(|key| key.date).collect();
        dates.into_iter().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Key, &BigDecimal)> {
        self.cells.iter()
    }
}

pub struct Aggregator {
    valuation: Option<Arc<Commodity>>,
    show_commodities: bool,
    mapper: AccountMapper,
    filters: Filters,
    partition: Partition,
    report: Report,
}

impl Aggregator {
    pub fn new(
        valuation: Option<Arc<Commodity>>,
        show_commodities: bool,
        mapper: AccountMapper,
        filters: Filters,
        partition: Partition,
    ) -> Aggregator {
        Aggregator {
            valuation,
            show_commodities,
            mapper,
            filters,
            partition,
            report: Report::default(),
        }
    }

    pub fn add(&mut self, day: &Day) -> Result<()> {
        let entries = if self.valuation.is_some() {
            &day.values
        } else {
            &day.amounts
        };
        for (position, quantity) in entries.iter() {
            if quantity.is_zero() {
                continue;
            }
            if !self.filters.match_account(&position.account)
                || !self.filters.match_commodity(&position.commodity)
            {
                continue;
            }
            let Some(account) = self.mapper.map(&position.account)? else {
                continue;
            };
            let commodity = if self.valuation.is_none() || self.show_commodities {
                Some(position.commodity.clone())
            } else {
                None
            };
            let date = self.partition.align(day.date).unwrap_or(day.date);
            self.report.add(
                Key {
                    account,
                    commodity,
                    date,
                },
                quantity,
            );
        }
        Ok(())
    }

    pub fn into_report(self) -> Report {
        self.report
    }
}

pub fn balance_table(report: &Report) -> Table {
    let mut table = Table::new();
    if report.is_empty() {
        return table;
    }
    let dates = report.dates();
    let show_commodities = report.iter().any(|(key, _)| key.commodity.is_some());

    let mut header = vec![Cell::left("Account")];
    if show_commodities {
        header.push(Cell::left("Commodity"));
    }
    for date in &dates {
        header.push(Cell::right(date.format("%Y-%m-%d").to_string()));
    }
    table.add_row(header);
    table.add_separator();

    let mut totals: BTreeMap<(Option<Arc<Commodity>>, NaiveDate), BigDecimal> = BTreeMap::new();
    for account_type in AccountType::ALL {
        let rows: Vec<_> = report
            .iter()
            .filter(|(key, _)| key.account.account_type() == account_type)
            .collect();
        if rows.is_empty() {
            continue;
        }
        table.add_row(vec![Cell::left(account_type.as_str())]);

        let mut section: BTreeMap<(Option<Arc<Commodity>>, NaiveDate), BigDecimal> =
            BTreeMap::new();
        let row_keys: BTreeSet<(&Arc<Account>, &Option<Arc<Commodity>>)> = rows
            .iter()
            .map(|(key, _)| (&key.account, &key.commodity))
            .collect();
        for (account, commodity) in row_keys {
            let mut cells = vec![Cell::indented(account.name(), 1)];
            if show_commodities {
                cells.push(match commodity {
                    Some(commodity) => Cell::left(commodity.code()),
                    None => Cell::Empty,
                });
            }
            for date in &dates {
                let key = Key {
                    account: account.clone(),
                    commodity: commodity.clone(),
                    date: *date,
                };
                match report.get(&key) {
                    Some(quantity) => {
                        *section
                            .entry((commodity.clone(), *date))
                            .or_insert_with(BigDecimal::zero) += quantity;
                        cells.push(Cell::decimal(quantity.clone()));
                    }
                    None => cells.push(Cell::Empty),
                }
            }
            table.add_row(cells);
        }

        let section_commodities: BTreeSet<Option<Arc<Commodity>>> =
            section.keys().map(|(commodity, _)| commodity.clone()).collect();
        for commodity in section_commodities {
            let mut cells = vec![Cell::left("Total")];
            if show_commodities {
                cells.push(match &commodity {
                    Some(commodity) => Cell::left(commodity.code()),
                    None => Cell::Empty,
                });
            }
            for date in &dates {
                match section.get(&(commodity.clone(), *date)) {
                    Some(total) => cells.push(Cell::decimal(total.clone())),
                    None => cells.push(Cell::Empty),
                }
            }
            table.add_row(cells);
        }
        for ((commodity, date), total) in section {
            *totals
                .entry((commodity, date))
                .or_insert_with(BigDecimal::zero) += &total;
        }
        table.add_separator();
    }

    let total_commodities: BTreeSet<Option<Arc<Commodity>>> =
        totals.keys().map(|(commodity, _)| commodity.clone()).collect();
    for commodity in total_commodities {
        let mut cells = vec![Cell::left("Total")];
        if show_commodities {
            cells.push(match &commodity {
                Some(commodity) => Cell::left(commodity.code()),
                None => Cell::Empty,
            });
        }
        for date in &dates {
            match totals.get(&(commodity.clone(), *date)) {
                Some(total) => cells.push(Cell::decimal(total.clone())),
                None => cells.push(Cell::Empty),
            }
        }
        table.add_row(cells);
    }
    table
}

pub struct Register {
    filters: Filters,
    valued: bool,
    sections: Vec<Section>,
}

struct Section {
    date: NaiveDate,
    rows: Vec<RegisterRow>,
}

struct RegisterRow {
    description: String,
    credit: Arc<Account>,
    debit: Arc<Account>,
    amount: BigDecimal,
    commodity: Arc<Commodity>,
    value: BigDecimal,
}

impl Register {
    pub fn new(filters: Filters, valued: bool) -> Register {
        Register {
            filters,
            valued,
            sections: Vec::new(),
        }
    }

    pub fn add(&mut self, day: &Day) {
        let mut rows = Vec::new();
        for transaction in &day.transactions {
            for posting in &transaction.postings {
                if !self.filters.match_commodity(&posting.commodity) {
                    continue;
                }
                if !self.filters.match_account(&posting.credit)
                    && !self.filters.match_account(&posting.debit)
                {
                    continue;
                }
                rows.push(RegisterRow {
                    description: transaction.description.clone(),
                    credit: posting.credit.clone(),
                    debit: posting.debit.clone(),
                    amount: posting.amount.clone(),
                    commodity: posting.commodity.clone(),
                    value: posting.value.clone(),
                });
            }
        }
        if !rows.is_empty() {
            self.sections.push(Section {
                date: day.date,
                rows,
            });
        }
    }

    pub fn to_table(&self) -> Table {
        let mut table = Table::new();
        if self.sections.is_empty() {
            return table;
        }
        let mut header = vec![
            Cell::left("Date"),
            Cell::left("Description"),
            Cell::left("Credit"),
            Cell::left("Debit"),
            Cell::right("Amount"),
            Cell::left("Commodity"),
        ];
        if self.valued {
            header.push(Cell::right("Value"));
        }
        table.add_row(header);
        table.add_separator();
        for section in &self.sections {
            for (idx, row) in section.rows.iter().enumerate() {
                let date = if idx == 0 {
                    Cell::left(section.date.format("%Y-%m-%d").to_string())
                } else {
                    Cell::Empty
                };
                let mut cells = vec![
                    date,
                    Cell::left(row.description.clone()),
                    Cell::left(row.credit.name()),
                    Cell::left(row.debit.name()),
                    Cell::decimal(row.amount.clone()),
                    Cell::left(row.commodity.code()),
                ];
                if self.valued {
                    cells.push(Cell::decimal(row.value.clone()));
                }
                table.add_row(cells);
            }
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amounts::Position;
    use crate::period::Interval;
    use anyhow::Result;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_shorten_truncates_matching_accounts() -> Result<()> {
        let registry = Arc::new(Registry::new());
        let mut mapper = AccountMapper::new(registry.clone());
        mapper
            .shorten
            .push(Collapse::new(1, Regex::new("^Expenses").unwrap()));

        let rent = registry.account("Expenses:Rent:Office")?;
        let bank = registry.account("Assets:Bank")?;
        assert_eq!(mapper.map(&rent)?.unwrap().name(), "Expenses");
        assert_eq!(mapper.map(&bank)?.unwrap().name(), "Assets:Bank");
        Ok(())
    }

    #[test]
    fn test_collapse_to_zero_drops_account() -> Result<()> {
        let registry = Arc::new(Registry::new());
        let mut mapper = AccountMapper::new(registry.clone());
        mapper
            .shorten
            .push(Collapse::new(0, Regex::new("^Equity").unwrap()));

        let equity = registry.account("Equity:Valuation")?;
        assert!(mapper.map(&equity)?.is_none());
        Ok(())
    }

    #[test]
    fn test_remap_runs_before_shorten() -> Result<()> {
        let registry = Arc::new(Registry::new());
        let mut mapper = AccountMapper::new(registry.clone());
        mapper
            .remap
            .push((Regex::new("^Expenses:Rent$").unwrap(), "Expenses:Housing".to_string()));

        let rent = registry.account("Expenses:Rent")?;
        assert_eq!(mapper.map(&rent)?.unwrap().name(), "Expenses:Housing");
        Ok(())
    }

    #[test]
    fn test_aggregator_groups_by_period_endpoint() -> Result<()> {
        let registry = Arc::new(Registry::new());
        let partition =
            Partition::new(date(2024, 1, 1), date(2024, 2, 29), Interval::Months, 0);
        let mut aggregator = Aggregator::new(
            None,
            false,
            AccountMapper::new(registry.clone()),
            Filters::default(),
            partition,
        );

        let bank = registry.account("Assets:Bank")?;
        let usd = registry.commodity("USD")?;
        let mut day = Day::new(date(2024, 1, 31));
        day.amounts
            .add(Position::new(bank.clone(), usd.clone()), &"10".parse::<BigDecimal>()?);
        aggregator.add(&day)?;

        let report = aggregator.into_report();
        let key = Key {
            account: bank,
            commodity: Some(usd),
            date: date(2024, 1, 31),
        };
        assert_eq!(report.get(&key), Some(&"10".parse::<BigDecimal>()?));
        Ok(())
    }

    #[test]
    fn test_aggregator_applies_filters() -> Result<()> {
        let registry = Arc::new(Registry::new());
        let partition =
            Partition::new(date(2024, 1, 1), date(2024, 1, 31), Interval::Once, 0);
        let mut aggregator = Aggregator::new(
            None,
            false,
            AccountMapper::new(registry.clone()),
            Filters {
                accounts: Some(Regex::new("^Assets").unwrap()),
                commodities: None,
            },
            partition,
        );

        let bank = registry.account("Assets:Bank")?;
        let salary = registry.account("Income:Salary")?;
        let usd = registry.commodity("USD")?;
        let mut day = Day::new(date(2024, 1, 31));
        day.amounts
            .add(Position::new(bank.clone(), usd.clone()), &"10".parse::<BigDecimal>()?);
        day.amounts
            .add(Position::new(salary.clone(), usd.clone()), &"-10".parse::<BigDecimal>()?);
        aggregator.add(&day)?;

        let report = aggregator.into_report();
        assert_eq!(report.iter().count(), 1);
        assert_eq!(report.iter().next().unwrap().0.account, bank);
        Ok(())
    }

    #[test]
    fn test_balance_table_layout() -> Result<()> {
        let registry = Arc::new(Registry::new());
        let bank = registry.account("Assets:Bank")?;
        let salary = registry.account("Income:Salary")?;
        let usd = registry.commodity("USD")?;

        let mut report = Report::default();
        report.add(
            Key {
                account: bank,
                commodity: Some(usd.clone()),
                date: date(2024, 1, 31),
            },
            &"1000.00".parse::<BigDecimal>()?,
        );
        report.add(
            Key {
                account: salary,
                commodity: Some(usd),
                date: date(2024, 1, 31),
            },
            &"-1000.00".parse::<BigDecimal>()?,
        );

        let table = balance_table(&report);
        let rendered = {
            let renderer = crate::table::TextRenderer {
                color: false,
                thousands: false,
                round: 2,
            };
            let mut out = Vec::new();
            renderer.render(&table, &mut out)?;
            String::from_utf8(out)?
        };
        assert!(rendered.contains("Assets"));
        assert!(rendered.contains("Assets:Bank"));
        assert!(rendered.contains("1000.00"));
        assert!(rendered.contains("Income:Salary"));
        assert!(rendered.contains("-1000.00"));
        Ok(())
    }

    #[test]
    fn test_empty_report_renders_empty_table() {
        let report = Report::default();
        let table = balance_table(&report);
        assert!(table.is_empty());
    }

    #[test]
    fn test_register_lists_postings_by_day() -> Result<()> {
        use crate::model::{Posting, SourceRange, Transaction};

        let registry = Arc::new(Registry::new());
        let mut register = Register::new(
            Filters {
                accounts: Some(Regex::new("^Assets:Bank").unwrap()),
                commodities: None,
            },
            false,
        );

        let mut day = Day::new(date(2024, 1, 15));
        day.transactions.push(Transaction {
            range: SourceRange::default(),
            date: day.date,
            description: "salary".to_string(),
            tags: Vec::new(),
            postings: vec![Posting::new(
                registry.account("Income:Salary")?,
                registry.account("Assets:Bank")?,
                registry.commodity("USD")?,
                "1000.00".parse::<BigDecimal>()?,
            )],
        });
        day.transactions.push(Transaction {
            range: SourceRange::default(),
            date: day.date,
            description: "lunch".to_string(),
            tags: Vec::new(),
            postings: vec![Posting::new(
                registry.account("Assets:Cash")?,
                registry.account("Expenses:Food")?,
                registry.commodity("USD")?,
                "12.50".parse::<BigDecimal>()?,
            )],
        });
        register.add(&day);

        // Only the posting touching the filtered account is listed; the
        // date shows on the first row of the section only.
        let table = register.to_table();
        let rows: Vec<_> = table
            .rows()
            .iter()
            .filter_map(|row| match row {
                crate::table::Row::Cells(cells) => Some(cells),
                crate::table::Row::Separator => None,
            })
            .collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][0], crate::table::Cell::left("2024-01-15"));
        assert_eq!(rows[1][1], crate::table::Cell::left("salary"));
        assert_eq!(rows[1][2], crate::table::Cell::left("Income:Salary"));
        Ok(())
    }
}
