//! Text rendering of tool results.

use crate::migration::MigrationStatus;
use crate::schema::AppData;

/// One line per recorded migration attempt, oldest first.
pub fn format_migration_history(history: &[MigrationStatus]) -> String {
    if history.is_empty() {
        return "No migration attempts recorded".to_string();
    }

    let mut result = format!("Found {} migration attempt(s):\n\n", history.len());
    for status in history {
        let outcome = if status.success { "success" } else { "failed" };
        result.push_str(&format!(
            "- {} {} -> {}: {} (backup created: {})\n",
            status.timestamp.to_rfc3339(),
            status.from_version,
            status.to_version,
            outcome,
            if status.backup_created { "yes" } else { "no" }
        ));
        if let Some(ref error) = status.error {
            result.push_str(&format!("  Error: {}\n", error));
        }
    }
    result
}

/// Record counts per module, for import and load confirmations.
pub fn format_summary(data: &AppData) -> String {
    let mut lines = vec![
        format!(
            "University: {} course(s), {} assignment(s), {} exam(s)",
            data.university.courses.len(),
            data.university.assignments.len(),
            data.university.exams.len()
        ),
        format!(
            "Freelancing: {} application(s), {} project(s), {} project task(s), {} standalone task(s)",
            data.freelancing.applications.len(),
            data.freelancing.projects.len(),
            data.freelancing.project_tasks.len(),
            data.freelancing.standalone_tasks.len()
        ),
        format!(
            "Programming: {} project(s), {} learning goal(s)",
            data.programming.projects.len(),
            data.programming.learning_goals.len()
        ),
        format!(
            "Finance: {} account(s), {} categor{}, {} income(s), {} expense(s)",
            data.finance.accounts.len(),
            data.finance.categories.len(),
            if data.finance.categories.len() == 1 { "y" } else { "ies" },
            data.finance.incomes.len(),
            data.finance.expenses.len()
        ),
        format!(
            "Home: {} shopping item(s), {} chore(s)",
            data.home.shopping_list.len(),
            data.home.chores.len()
        ),
        format!(
            "Misc: {} note(s), {} link(s)",
            data.misc.notes.len(),
            data.misc.links.len()
        ),
    ];
    if !data.extra.is_empty() {
        let mut names: Vec<&str> = data.extra.keys().map(String::as_str).collect();
        names.sort_unstable();
        lines.push(format!("Other modules: {}", names.join(", ")));
    }
    lines.join("\n")
}
