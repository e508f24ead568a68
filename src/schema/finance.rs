//! Finance module: accounts, categories and transactions.

use super::lenient;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Fixed/variable/emergency classification of an income or expense.
///
/// Decoding is lenient: any value that is not one of the three names
/// decodes as `Variable`, which is also what the legacy free-text `type`
/// migrates to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionNature {
    Fixed,
    #[default]
    Variable,
    Emergency,
}

impl TransactionNature {
    pub const ALL: [TransactionNature; 3] = [Self::Fixed, Self::Variable, Self::Emergency];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::Variable => "variable",
            Self::Emergency => "emergency",
        }
    }
}

impl fmt::Display for TransactionNature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionNature {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fixed" => Ok(Self::Fixed),
            "variable" => Ok(Self::Variable),
            "emergency" => Ok(Self::Emergency),
            _ => Err(format!(
                "Invalid transaction nature '{}'. Valid options are: fixed, variable, emergency",
                s
            )),
        }
    }
}

impl<'de> Deserialize<'de> for TransactionNature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        Ok(raw
            .as_str()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryKind {
    #[default]
    Income,
    Expense,
}

impl CategoryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

impl<'de> Deserialize<'de> for CategoryKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            Some("expense") => Self::Expense,
            _ => Self::Income,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Category {
    #[serde(deserialize_with = "lenient::text")]
    pub id: String,
    #[serde(deserialize_with = "lenient::text")]
    pub name: String,
    pub kind: CategoryKind,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Category {
    pub fn new(id: &str, name: &str, kind: CategoryKind) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            kind,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Account {
    #[serde(deserialize_with = "lenient::text")]
    pub id: String,
    #[serde(deserialize_with = "lenient::text")]
    pub name: String,
    /// "checking", "savings", "cash", "credit"
    #[serde(deserialize_with = "lenient::text")]
    pub kind: String,
    #[serde(deserialize_with = "lenient::amount")]
    pub balance: f64,
    #[serde(deserialize_with = "lenient::optional_text")]
    pub currency: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Account {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            kind: "checking".to_string(),
            balance: 0.0,
            currency: None,
            extra: Map::new(),
        }
    }
}

/// An income or expense entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Transaction {
    #[serde(deserialize_with = "lenient::text")]
    pub id: String,
    #[serde(deserialize_with = "lenient::text")]
    pub description: String,
    #[serde(deserialize_with = "lenient::amount")]
    pub amount: f64,
    #[serde(deserialize_with = "lenient::optional_text")]
    pub date: Option<String>,
    #[serde(deserialize_with = "lenient::optional_text")]
    pub category_id: Option<String>,
    #[serde(rename = "type")]
    pub nature: TransactionNature,
    #[serde(deserialize_with = "lenient::optional_text")]
    pub account_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

pub type Income = Transaction;
pub type Expense = Transaction;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FinanceData {
    pub accounts: Vec<Account>,
    pub categories: Vec<Category>,
    pub incomes: Vec<Income>,
    pub expenses: Vec<Expense>,
    #[serde(deserialize_with = "lenient::optional_text")]
    pub default_account_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for FinanceData {
    fn default() -> Self {
        Self {
            accounts: Vec::new(),
            categories: default_categories(),
            incomes: Vec::new(),
            expenses: Vec::new(),
            default_account_id: None,
            extra: Map::new(),
        }
    }
}

impl FinanceData {
    pub fn category(&self, id: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }
}

/// Categories every installation starts with. Ids are stable; migrations
/// resolve legacy names against them.
pub fn default_categories() -> Vec<Category> {
    use CategoryKind::{Expense, Income};
    vec![
        Category::new("cat-salary", "Salary", Income),
        Category::new("cat-freelance", "Freelance", Income),
        Category::new("cat-investments", "Investments", Income),
        Category::new("cat-other-income", "Other income", Income),
        Category::new("cat-housing", "Housing", Expense),
        Category::new("cat-food", "Food", Expense),
        Category::new("cat-transport", "Transport", Expense),
        Category::new("cat-utilities", "Utilities", Expense),
        Category::new("cat-entertainment", "Entertainment", Expense),
        Category::new("cat-other-expense", "Other expenses", Expense),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nature_decodes_leniently() {
        let fixed: TransactionNature = serde_json::from_value(json!("fixed")).unwrap();
        assert_eq!(fixed, TransactionNature::Fixed);
        let odd: TransactionNature = serde_json::from_value(json!("salary")).unwrap();
        assert_eq!(odd, TransactionNature::Variable);
        let missing: TransactionNature = serde_json::from_value(json!(null)).unwrap();
        assert_eq!(missing, TransactionNature::Variable);
    }

    #[test]
    fn nature_from_str_rejects_unknown() {
        assert_eq!(
            "emergency".parse::<TransactionNature>(),
            Ok(TransactionNature::Emergency)
        );
        assert!("salary".parse::<TransactionNature>().is_err());
    }

    #[test]
    fn non_finite_amount_reads_as_zero_and_survives_reload() {
        let tx: Transaction =
            serde_json::from_value(json!({ "id": "e1", "amount": "NaN" })).unwrap();
        assert_eq!(tx.amount, 0.0);
        let reloaded: Transaction =
            serde_json::from_str(&serde_json::to_string(&tx).unwrap()).unwrap();
        assert_eq!(reloaded.amount, 0.0);

        let account: Account = serde_json::from_value(json!({ "balance": "inf" })).unwrap();
        assert_eq!(account.balance, 0.0);
    }

    #[test]
    fn transaction_reads_string_amount_and_type_field() {
        let tx: Transaction = serde_json::from_value(json!({
            "id": "i1",
            "amount": "1250.50",
            "type": "fixed",
            "categoryId": "cat-salary"
        }))
        .unwrap();
        assert_eq!(tx.amount, 1250.5);
        assert_eq!(tx.nature, TransactionNature::Fixed);
        assert_eq!(tx.category_id.as_deref(), Some("cat-salary"));

        let back = serde_json::to_value(&tx).unwrap();
        assert_eq!(back["type"], json!("fixed"));
    }

    #[test]
    fn default_finance_has_salary_category() {
        let finance = FinanceData::default();
        let salary = finance.category("cat-salary").unwrap();
        assert_eq!(salary.name, "Salary");
        assert_eq!(salary.kind, CategoryKind::Income);
    }
}
