//! Schema registry: storage keys, version tags, document shapes and the
//! per-module default factories.
//!
//! - `keys`: storage key names and generation tags
//! - `document`: `AppData`, `StoredDocument` and module decoding
//! - `modules`: university, freelancing, programming, home, misc, settings
//! - `finance`: accounts, categories and transactions

mod document;
mod finance;
pub mod keys;
pub(crate) mod lenient;
mod modules;

pub use document::{
    AppData, DecodeIssue, Module, StoredDocument, create_default_app_data, default_app_data_value,
};
pub(crate) use document::json_kind;
pub use finance::{
    Account, Category, CategoryKind, Expense, FinanceData, Income, Transaction,
    TransactionNature, default_categories,
};
pub use modules::{
    Application, Assignment, Chore, ClientProject, CodeProject, Course, Exam, FreelancingData,
    HomeData, LearningGoal, Link, MiscData, Note, NotificationSettings, Profile,
    ProgrammingData, ProjectTask, Settings, ShoppingItem, StandaloneTask, UniversityData,
};
