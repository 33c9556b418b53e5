use serde::Serialize;

use crate::cli::overlay::StatusOverlay;
use crate::model::config::AppConfig;
use crate::model::session::Session;
use crate::model::task::{Task, TaskStatus};
use crate::ops::expand::ExpansionReport;
use crate::util::unicode::{display_width, pad_to_width, preview};

/// Shown when a listing has nothing in it
pub const EMPTY_LIST_MESSAGE: &str = "Your to-do list is quieter than a coffee shop at 2 a.m.";

const PREVIEW_WIDTH: usize = 60;
const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct TaskJson {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Serialize)]
pub struct ExpansionItemJson {
    pub title: String,
    pub created: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpansionOutcomeJson {
    NothingToDo,
    Expanded,
}

#[derive(Serialize)]
pub struct ExpansionJson {
    pub outcome: ExpansionOutcomeJson,
    pub created: usize,
    pub failed: usize,
    pub skipped: usize,
    pub items: Vec<ExpansionItemJson>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refetch_error: Option<String>,
}

#[derive(Serialize)]
pub struct SessionJson {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
}

/// `config show --json`; the anon key is masked
#[derive(Serialize)]
pub struct ConfigJson {
    pub store_url: String,
    pub store_anon_key: String,
    pub store_table: String,
    pub generator_proxy_url: String,
    pub list_sort: String,
    pub server_bind: String,
    pub server_model: String,
    pub server_upstream_url: String,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

/// JSON view of a task, showing `status` as displayed
pub fn task_to_json(task: &Task, status: TaskStatus) -> TaskJson {
    TaskJson {
        id: task.id.to_string(),
        title: task.title.clone(),
        description: task.description.clone(),
        status,
        created_at: task.created_at.to_rfc3339(),
        updated_at: task.updated_at.map(|t| t.to_rfc3339()),
    }
}

/// The generator had no sub-tasks to offer
pub fn nothing_to_do_json() -> ExpansionJson {
    ExpansionJson {
        outcome: ExpansionOutcomeJson::NothingToDo,
        created: 0,
        failed: 0,
        skipped: 0,
        items: Vec::new(),
        refetch_error: None,
    }
}

pub fn report_to_json(report: &ExpansionReport) -> ExpansionJson {
    ExpansionJson {
        outcome: ExpansionOutcomeJson::Expanded,
        created: report.created(),
        failed: report.failed(),
        skipped: report.skipped,
        items: report
            .items
            .iter()
            .map(|item| ExpansionItemJson {
                title: item.title.clone(),
                created: item.result.is_ok(),
                error: item.result.as_ref().err().map(|e| e.to_string()),
            })
            .collect(),
        refetch_error: report.refetch.as_ref().err().map(|e| e.to_string()),
    }
}

pub fn session_to_json(session: &Session) -> SessionJson {
    SessionJson {
        user_id: session.user_id.clone(),
        email: session.email.clone(),
        expires_at: session.expires_at.map(|t| t.to_rfc3339()),
    }
}

pub fn config_to_json(config: &AppConfig) -> ConfigJson {
    ConfigJson {
        store_url: config.store.url.clone(),
        store_anon_key: mask_secret(&config.store.anon_key),
        store_table: config.store.table.clone(),
        generator_proxy_url: config.generator.proxy_url.clone(),
        list_sort: config.list.sort.to_string(),
        server_bind: config.server.bind.clone(),
        server_model: config.server.model.clone(),
        server_upstream_url: config.server.upstream_url.clone(),
    }
}

/// Keep the first 4 characters of a key so it can be recognized
pub fn mask_secret(secret: &str) -> String {
    if secret.is_empty() {
        return String::new();
    }
    let head: String = secret.chars().take(4).collect();
    format!("{}…", head)
}

// ---------------------------------------------------------------------------
// Human-readable formatting
// ---------------------------------------------------------------------------

/// Format a single task as a one-line summary
pub fn format_task_line(task: &Task, status: TaskStatus) -> String {
    format!("[{}] {} {}", status.marker_char(), task.id, task.title)
}

/// Format detailed task view
pub fn format_task_detail(task: &Task, status: TaskStatus) -> Vec<String> {
    let mut lines = vec![format_task_line(task, status)];
    lines.push(format!("status: {}", status.label()));
    lines.push(format!("created: {}", task.created_at.format(DATE_FORMAT)));
    if let Some(updated) = task.updated_at {
        lines.push(format!("updated: {}", updated.format(DATE_FORMAT)));
    }
    if !task.description.is_empty() {
        lines.push("description:".to_string());
        for line in task.description.lines() {
            lines.push(format!("  {}", line));
        }
    }
    lines
}

/// One line per task in snapshot order, with a description preview.
///
/// `filter` is applied to the displayed status, so a pending override
/// moves a task between tabs before the store confirms it.
pub fn format_listing(tasks: &[Task], filter: Option<TaskStatus>, overlay: &StatusOverlay) -> Vec<String> {
    let shown: Vec<(&Task, TaskStatus)> = tasks
        .iter()
        .map(|t| (t, overlay.effective(t)))
        .filter(|(_, status)| filter.is_none_or(|f| *status == f))
        .collect();
    if shown.is_empty() {
        return vec![EMPTY_LIST_MESSAGE.to_string()];
    }

    let width = shown
        .iter()
        .map(|(t, s)| display_width(&format_task_line(t, *s)))
        .max()
        .unwrap_or(0);
    shown
        .into_iter()
        .map(|(task, status)| {
            let line = format_task_line(task, status);
            let desc = preview(&task.description, PREVIEW_WIDTH);
            if desc.is_empty() {
                line
            } else {
                format!("{}  {}", pad_to_width(&line, width), desc)
            }
        })
        .collect()
}

/// Summary lines for a finished expansion
pub fn format_expansion(report: &ExpansionReport) -> Vec<String> {
    let mut lines = Vec::new();
    for item in report.failures() {
        if let Err(e) = &item.result {
            lines.push(format!("could not add '{}': {}", item.title, e));
        }
    }
    let mut summary = format!("{} created, {} failed", report.created(), report.failed());
    if report.skipped > 0 {
        summary.push_str(&format!(", {} skipped", report.skipped));
    }
    lines.push(summary);
    if let Err(e) = &report.refetch {
        lines.push(format!("could not refresh the list: {}", e));
    }
    lines
}

/// Parse a `--status` filter; `all` means no filter
pub fn parse_status_filter(s: &str) -> Result<Option<TaskStatus>, String> {
    if s == "all" {
        return Ok(None);
    }
    parse_status(s).map(Some)
}

pub fn parse_status(s: &str) -> Result<TaskStatus, String> {
    TaskStatus::parse(s).ok_or_else(|| {
        format!(
            "unknown status '{}' (expected: todo, in_progress, done)",
            s
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::task::TaskId;
    use chrono::{TimeZone, Utc};
    use insta::assert_snapshot;
    use pretty_assertions::assert_eq;

    fn task(id: &str, title: &str, description: &str, status: TaskStatus) -> Task {
        Task {
            id: TaskId::from(id),
            user_id: "u-1".into(),
            title: title.into(),
            description: description.into(),
            status,
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap(),
            updated_at: None,
        }
    }

    #[test]
    fn task_line_marks_status() {
        let t = task("7", "Buy litter", "", TaskStatus::Done);
        assert_eq!(format_task_line(&t, t.status), "[x] 7 Buy litter");
        assert_eq!(format_task_line(&t, TaskStatus::InProgress), "[>] 7 Buy litter");
    }

    #[test]
    fn listing_filters_on_displayed_status() {
        let tasks = [
            task("1", "Feed", "twice a day", TaskStatus::Todo),
            task("2", "Groom", "", TaskStatus::Done),
        ];
        let mut overlay = StatusOverlay::new();
        let lines = format_listing(&tasks, Some(TaskStatus::Done), &overlay);
        assert_eq!(lines, vec!["[x] 2 Groom"]);

        overlay.set(TaskId::from("1"), TaskStatus::Done);
        let lines = format_listing(&tasks, Some(TaskStatus::Done), &overlay);
        assert_eq!(lines, vec!["[x] 1 Feed   twice a day", "[x] 2 Groom"]);
    }

    #[test]
    fn empty_listing_has_a_message() {
        let lines = format_listing(&[], None, &StatusOverlay::new());
        assert_eq!(lines, vec![EMPTY_LIST_MESSAGE]);
    }

    #[test]
    fn detail_view() {
        let t = task("3", "Vet visit", "bring card\ncarrier in hall", TaskStatus::InProgress);
        assert_snapshot!(format_task_detail(&t, t.status).join("\n"), @r"
        [>] 3 Vet visit
        status: In Progress
        created: 2026-03-01 09:30
        description:
          bring card
          carrier in hall
        ");
    }

    #[test]
    fn status_filter_parsing() {
        assert_eq!(parse_status_filter("all"), Ok(None));
        assert_eq!(parse_status_filter("in-progress"), Ok(Some(TaskStatus::InProgress)));
        assert!(parse_status_filter("blocked").is_err());
    }

    #[test]
    fn expansion_json_names_its_outcome() {
        let empty = serde_json::to_value(nothing_to_do_json()).unwrap();
        assert_eq!(empty["outcome"], "nothing_to_do");
        assert_eq!(empty["created"], 0);

        let report = ExpansionReport {
            items: Vec::new(),
            skipped: 2,
            refetch: Ok(()),
        };
        let expanded = serde_json::to_value(report_to_json(&report)).unwrap();
        assert_eq!(expanded["outcome"], "expanded");
        assert_eq!(expanded["skipped"], 2);
        assert!(expanded.get("refetch_error").is_none());
    }

    #[test]
    fn secrets_are_masked() {
        assert_eq!(mask_secret(""), "");
        assert_eq!(mask_secret("eyJhbGciOi"), "eyJh…");
    }
}
