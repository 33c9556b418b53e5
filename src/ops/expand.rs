use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::io::generator::{GenerateError, TextGenerator};
use crate::io::store::TaskStore;
use crate::model::task::TITLE_MAX;
use crate::ops::sync::{SyncError, TaskSync};

pub const EMPTY_INPUT_MESSAGE: &str =
    "C'mon, type something! I swear I won't sit on your keyboard… this time.";
pub const MALFORMED_MESSAGE: &str =
    "Oops! TiM chased a laser instead of your task. Mind rephrasing it?";
pub const NOTHING_TO_DO_MESSAGE: &str =
    "Even my feline genius has limits. Try a clearer task and I’ll pounce on it!";
pub const EXPANDED_MESSAGE: &str =
    "TiM successfully broke down your task! Paws-itively productive!";

/// Opening fence: three backticks, optional language tag, line break
static LEADING_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\A\s*```[A-Za-z0-9_+.-]*[ \t]*\r?\n").unwrap());
/// Closing fence at the very end
static TRAILING_FENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"```\s*\z").unwrap());

/// Error type for the expansion flow. Nothing is created when one of these
/// is returned.
#[derive(Debug, thiserror::Error)]
pub enum ExpandError {
    #[error("{}", EMPTY_INPUT_MESSAGE)]
    EmptyInput,
    #[error(transparent)]
    Generation(#[from] GenerateError),
    /// Not JSON, or JSON that is not an array
    #[error("{}", MALFORMED_MESSAGE)]
    Malformed,
}

/// One element of the parsed array, before validation
#[derive(Debug, Clone, PartialEq)]
pub struct RawSubtask(pub Value);

impl RawSubtask {
    /// Both fields must be non-empty strings; anything else is skipped
    pub fn validate(&self) -> Option<SubtaskDraft> {
        let field = |name: &str| {
            self.0
                .get(name)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        Some(SubtaskDraft {
            title: field("title")?,
            description: field("description")?,
        })
    }
}

/// A sub-task ready to be created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtaskDraft {
    pub title: String,
    pub description: String,
}

/// Outcome of creating one sub-task
#[derive(Debug)]
pub struct ItemOutcome {
    pub title: String,
    pub result: Result<(), SyncError>,
}

/// What a completed expansion did
#[derive(Debug)]
pub struct ExpansionReport {
    /// One entry per valid element, in array order
    pub items: Vec<ItemOutcome>,
    /// Elements dropped for a missing title or description
    pub skipped: usize,
    /// The single refetch issued after the loop
    pub refetch: Result<(), SyncError>,
}

impl ExpansionReport {
    pub fn created(&self) -> usize {
        self.items.iter().filter(|i| i.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.items.len() - self.created()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.items.iter().filter(|i| i.result.is_err())
    }
}

#[derive(Debug)]
pub enum ExpandOutcome {
    /// The generator returned an empty array
    NothingToDo,
    Expanded(ExpansionReport),
}

/// The instruction sent to the generator. `input` is embedded verbatim at the end.
pub fn build_prompt(input: &str) -> String {
    format!(
        "Break down the following high-level task into a list of smaller, actionable, and specific sub-tasks. \
Provide the output as a JSON array of objects, where each object has a 'title' (string, max of {max} characters) \
and a 'description' (string). Do NOT include any additional text, markdown formatting outside the JSON, \
or explanations. Example: '[{{\"title\": \"Subtask 1\", \"description\": \"Details for subtask 1\"}}, \
{{\"title\": \"Subtask 2\", \"description\": \"Details for subtask 2\"}}]'\n\
High-level task: {input}",
        max = TITLE_MAX,
        input = input,
    )
}

/// Strip a markdown code fence around generated text, then trim.
///
/// Removes a leading "```lang\n" and a trailing "```" when present; text
/// without fences only loses surrounding whitespace.
pub fn strip_fences(raw: &str) -> &str {
    let mut text = raw;
    if let Some(m) = LEADING_FENCE.find(text) {
        text = &text[m.end()..];
    }
    if let Some(m) = TRAILING_FENCE.find(text) {
        text = &text[..m.start()];
    }
    text.trim()
}

/// Normalize and parse generated text into array elements
pub fn parse_subtasks(raw: &str) -> Result<Vec<RawSubtask>, ExpandError> {
    let text = strip_fences(raw);
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Array(items)) => Ok(items.into_iter().map(RawSubtask).collect()),
        Ok(other) => {
            debug!(kind = json_kind(&other), "generated JSON is not an array");
            Err(ExpandError::Malformed)
        }
        Err(e) => {
            debug!(error = %e, "generated text is not JSON");
            Err(ExpandError::Malformed)
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Break `input` into sub-tasks with one generator round trip and create
/// them in array order, one at a time.
///
/// A failed sub-task is recorded and the loop moves on. When the array is
/// non-empty the list is refetched once at the end.
pub async fn expand_task<S, G>(
    sync: &mut TaskSync<S>,
    generator: &G,
    input: &str,
) -> Result<ExpandOutcome, ExpandError>
where
    S: TaskStore,
    G: TextGenerator + ?Sized,
{
    if input.trim().is_empty() {
        return Err(ExpandError::EmptyInput);
    }

    let prompt = build_prompt(input);
    let generated = generator.generate(&prompt).await?;
    let elements = parse_subtasks(&generated)?;
    if elements.is_empty() {
        info!("generator returned no sub-tasks");
        return Ok(ExpandOutcome::NothingToDo);
    }

    let mut items = Vec::new();
    let mut skipped = 0;
    for element in &elements {
        let Some(draft) = element.validate() else {
            skipped += 1;
            continue;
        };
        let result = sync.add_task(&draft.title, &draft.description).await;
        if let Err(e) = &result {
            warn!(title = %draft.title, error = %e, "could not add generated sub-task");
        }
        items.push(ItemOutcome {
            title: draft.title,
            result,
        });
    }

    let refetch = sync.fetch_tasks().await.map(|_| ());
    let report = ExpansionReport {
        items,
        skipped,
        refetch,
    };
    info!(
        created = report.created(),
        failed = report.failed(),
        skipped = report.skipped,
        "expansion finished"
    );
    Ok(ExpandOutcome::Expanded(report))
}
