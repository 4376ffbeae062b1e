use indexmap::IndexMap;
use lazy_static::lazy_static;
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};

use crate::error::{JournalError, Result};

lazy_static! {
    static ref ACCOUNT_NAME: Regex =
        Regex::new(r"^[A-Z][A-Za-z0-9]*(:[A-Za-z0-9]+)*$").unwrap();
    static ref COMMODITY_CODE: Regex = Regex::new(r"^[A-Za-z0-9]+$").unwrap();
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AccountType {
    Assets,
    Liabilities,
    Equity,
    Income,
    Expenses,
}

impl AccountType {
    pub const ALL: [AccountType; 5] = [
        AccountType::Assets,
        AccountType::Liabilities,
        AccountType::Equity,
        AccountType::Income,
        AccountType::Expenses,
    ];

    fn from_segment(s: &str) -> Option<AccountType> {
        match s {
            "Assets" => Some(AccountType::Assets),
            "Liabilities" => Some(AccountType::Liabilities),
            "Equity" => Some(AccountType::Equity),
            "Income" => Some(AccountType::Income),
            "Expenses" => Some(AccountType::Expenses),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Assets => "Assets",
            AccountType::Liabilities => "Liabilities",
            AccountType::Equity => "Equity",
            AccountType::Income => "Income",
            AccountType::Expenses => "Expenses",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub struct Account {
    name: String,
    account_type: AccountType,
}

impl Account {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn account_type(&self) -> AccountType {
        self.account_type
    }

    pub fn split(&self) -> Vec<&str> {
        self.name.split(':').collect()
    }

    pub fn parent_name(&self) -> Option<&str> {
        self.name.rfind(':').map(|idx| &self.name[..idx])
    }

    pub fn is_asset_or_liability(&self) -> bool {
        matches!(
            self.account_type,
            AccountType::Assets | AccountType::Liabilities
        )
    }

    pub fn is_income_or_expense(&self) -> bool {
        matches!(
            self.account_type,
            AccountType::Income | AccountType::Expenses
        )
    }
}

impl PartialEq for Account {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Account {}

impl Hash for Account {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl PartialOrd for Account {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Account {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.account_type, &self.name).cmp(&(other.account_type, &other.name))
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Debug, PartialEq, Eq, Hash)]
pub struct Commodity {
    code: String,
}

impl Commodity {
    pub fn code(&self) -> &str {
        &self.code
    }
}

impl PartialOrd for Commodity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Commodity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.code.cmp(&other.code)
    }
}

impl fmt::Display for Commodity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code)
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    accounts: Mutex<IndexMap<String, Arc<Account>>>,
    commodities: Mutex<IndexMap<String, Arc<Commodity>>>,
}

impl Registry {
    pub fn new() -> Registry {
        Registry::default()
    }

    pub fn account(&self, name: &str) -> Result<Arc<Account>> {
        if !ACCOUNT_NAME.is_match(name) {
            return Err(JournalError::UnknownAccount(name.to_string()));
        }
        let head = name.split(':').next().unwrap_or_default();
        let account_type = AccountType::from_segment(head)
            .ok_or_else(|| JournalError::UnknownAccount(name.to_string()))?;

        let mut accounts = self.accounts.lock().unwrap();
        if let Some(existing) = accounts.get(name) {
            return Ok(existing.clone());
        }
        let account = Arc::new(Account {
            name: name.to_string(),
            account_type,
        });
        accounts.insert(name.to_string(), account.clone());
        Ok(account)
    }

    pub fn commodity(&self, code: &str) -> Result<Arc<Commodity>> {
        if !COMMODITY_CODE.is_match(code) {
            return Err(JournalError::UnknownCommodity(code.to_string()));
        }
        let mut commodities = self.commodities.lock().unwrap();
        if let Some(existing) = commodities.get(code) {
            return Ok(existing.clone());
        }
        let commodity = Arc::new(Commodity {
            code: code.to_string(),
        });
        commodities.insert(code.to_string(), commodity.clone());
        Ok(commodity)
    }

    pub fn valuation_account(&self) -> Arc<Account> {
        self.account("Equity:Valuation")
            .expect("reserved account name is valid")
    }

    pub fn equity_account(&self) -> Arc<Account> {
        self.account("Equity:Equity")
            .expect("reserved account name is valid")
    }

    pub fn retained_earnings_account(&self) -> Arc<Account> {
        self.account("Equity:RetainedEarnings")
            .expect("reserved account name is valid")
    }

    pub fn parent(&self, account: &Account) -> Option<Arc<Account>> {
        account
            .parent_name()
            .and_then(|name| self.account(name).ok())
    }
}
