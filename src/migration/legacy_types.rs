//! Legacy (V1) fragment layout.
//!
//! The legacy layout kept six independent entries with no shared version
//! tag. Each slot has an expected JSON shape; a value of any other shape is
//! replaced by the slot's empty default so a single bad fragment never
//! poisons the rest.

use crate::schema::keys::{
    V1_FINANCE_KEY, V1_FREELANCING_PROJECT_TASKS_KEY, V1_FREELANCING_PROJECTS_KEY,
    V1_FREELANCING_STANDALONE_TASKS_KEY, V1_MAIN_KEY, V1_PROGRAMMING_KEY,
};
use crate::schema::{Module, json_kind};
use serde_json::{Map, Value};
use tracing::warn;

/// One of the six legacy entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FragmentSlot {
    Main,
    FreelancingProjects,
    FreelancingProjectTasks,
    FreelancingStandaloneTasks,
    Programming,
    Finance,
}

impl FragmentSlot {
    pub const ALL: [FragmentSlot; 6] = [
        Self::Main,
        Self::FreelancingProjects,
        Self::FreelancingProjectTasks,
        Self::FreelancingStandaloneTasks,
        Self::Programming,
        Self::Finance,
    ];

    /// Storage key of the fragment.
    pub fn key(self) -> &'static str {
        match self {
            Self::Main => V1_MAIN_KEY,
            Self::FreelancingProjects => V1_FREELANCING_PROJECTS_KEY,
            Self::FreelancingProjectTasks => V1_FREELANCING_PROJECT_TASKS_KEY,
            Self::FreelancingStandaloneTasks => V1_FREELANCING_STANDALONE_TASKS_KEY,
            Self::Programming => V1_PROGRAMMING_KEY,
            Self::Finance => V1_FINANCE_KEY,
        }
    }

    /// Field name of the fragment in the intermediate value handed to the
    /// migration pipeline.
    pub fn field(self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::FreelancingProjects => "freelancingProjects",
            Self::FreelancingProjectTasks => "freelancingProjectTasks",
            Self::FreelancingStandaloneTasks => "freelancingStandaloneTasks",
            Self::Programming => "programming",
            Self::Finance => "finance",
        }
    }

    pub(crate) fn expects_list(self) -> bool {
        matches!(
            self,
            Self::FreelancingProjects
                | Self::FreelancingProjectTasks
                | Self::FreelancingStandaloneTasks
        )
    }
}

/// Typed view of the six legacy entries.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyFragmentSet {
    pub main: Map<String, Value>,
    pub freelancing_projects: Vec<Value>,
    pub freelancing_project_tasks: Vec<Value>,
    pub freelancing_standalone_tasks: Vec<Value>,
    pub programming: Value,
    pub finance: Value,
}

impl Default for LegacyFragmentSet {
    fn default() -> Self {
        Self {
            main: Map::new(),
            freelancing_projects: Vec::new(),
            freelancing_project_tasks: Vec::new(),
            freelancing_standalone_tasks: Vec::new(),
            programming: Module::Programming.default_value(),
            finance: Module::Finance.default_value(),
        }
    }
}

impl LegacyFragmentSet {
    /// Put `value` into `slot`. Absent values and values of the wrong shape
    /// leave the slot at its default. Returns whether the value was taken.
    pub fn assign(&mut self, slot: FragmentSlot, value: Option<Value>) -> bool {
        let Some(value) = value else {
            return false;
        };
        match (slot.expects_list(), value) {
            (true, Value::Array(items)) => {
                match slot {
                    FragmentSlot::FreelancingProjects => self.freelancing_projects = items,
                    FragmentSlot::FreelancingProjectTasks => self.freelancing_project_tasks = items,
                    _ => self.freelancing_standalone_tasks = items,
                }
                true
            }
            (false, Value::Object(object)) => {
                match slot {
                    FragmentSlot::Main => self.main = object,
                    FragmentSlot::Programming => self.programming = Value::Object(object),
                    _ => self.finance = Value::Object(object),
                }
                true
            }
            (_, Value::Null) => false,
            (expects_list, other) => {
                warn!(
                    fragment = slot.key(),
                    expected = if expects_list { "array" } else { "object" },
                    found = json_kind(&other),
                    "legacy fragment has unexpected shape, using default"
                );
                false
            }
        }
    }

    /// Intermediate value consumed by the `v1.unify-fragments` step.
    pub fn into_value(self) -> Value {
        let mut object = Map::new();
        object.insert(FragmentSlot::Main.field().to_string(), Value::Object(self.main));
        object.insert(
            FragmentSlot::FreelancingProjects.field().to_string(),
            Value::Array(self.freelancing_projects),
        );
        object.insert(
            FragmentSlot::FreelancingProjectTasks.field().to_string(),
            Value::Array(self.freelancing_project_tasks),
        );
        object.insert(
            FragmentSlot::FreelancingStandaloneTasks.field().to_string(),
            Value::Array(self.freelancing_standalone_tasks),
        );
        object.insert(FragmentSlot::Programming.field().to_string(), self.programming);
        object.insert(FragmentSlot::Finance.field().to_string(), self.finance);
        Value::Object(object)
    }
}
