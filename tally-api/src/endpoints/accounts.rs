use super::{Cents, Record, RowId, Table};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy)]
pub struct Accounts;

impl Table for Accounts {
    const NAME: &'static str = "accounts";
    type Row = Account;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: RowId,
    pub user_id: String,
    pub name: String,
    pub account_type: AccountType,
    /// Balance before the first recorded item, in cents
    #[serde(default)]
    pub opening_balance: Cents,
    pub sort_order: i64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Record for Account {
    fn id(&self) -> &RowId {
        &self.id
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Checking,
    Savings,
    Cash,
    CreditCard,
    Investment,
    Loan,
    Other,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Checking => "checking",
            Self::Savings => "savings",
            Self::Cash => "cash",
            Self::CreditCard => "credit_card",
            Self::Investment => "investment",
            Self::Loan => "loan",
            Self::Other => "other",
        }
    }

    /// Liability accounts count against net worth
    pub fn is_liability(&self) -> bool {
        matches!(self, Self::CreditCard | Self::Loan)
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountTypeParseError(String);

impl std::fmt::Display for AccountTypeParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown account type '{}'", self.0)
    }
}

impl std::error::Error for AccountTypeParseError {}

impl FromStr for AccountType {
    type Err = AccountTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "checking" => Ok(Self::Checking),
            "savings" => Ok(Self::Savings),
            "cash" => Ok(Self::Cash),
            "credit_card" => Ok(Self::CreditCard),
            "investment" => Ok(Self::Investment),
            "loan" => Ok(Self::Loan),
            "other" => Ok(Self::Other),
            _ => Err(AccountTypeParseError(s.to_string())),
        }
    }
}
