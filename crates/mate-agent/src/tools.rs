//! Tool surface the reasoning process invokes against the task store.
//!
//! Every tool takes a JSON argument object and returns a human-readable
//! status string. Failures are encoded as text, never raised: the internal
//! boundary returns a typed [`ToolError`], and [`ToolRegistry::invoke`]
//! flattens it to the outward text contract.

use mate_core::{validate_due_date, validate_priority, Task, TaskFilter, TaskStatus, ValidationError};
use mate_store::{StoreError, TaskPatch, TaskStore};
use serde_json::{json, Value};

/// Out-of-band marker returned by the `task_form` tool. The relay watches
/// message content for this token to decide when to inject the form UI.
pub const TASK_FORM_MARKER: &str = "[[TASK_FORM_UI]]";

pub const TASK_FORM_TOOL: &str = "task_form";
pub const THINK_TOOL: &str = "think";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
}

/// Registry surface a reasoning process binds to.
pub const TOOL_SPECS: &[ToolSpec] = &[
    ToolSpec {
        name: TASK_FORM_TOOL,
        description: "Render the interactive task entry form in the chat window.",
    },
    ToolSpec {
        name: "add_task",
        description: "Save a single task record.",
    },
    ToolSpec {
        name: "process_tasks",
        description: "Save a batch of task records at once.",
    },
    ToolSpec {
        name: "get_task",
        description: "Fetch one task by its ID.",
    },
    ToolSpec {
        name: "get_tasks",
        description: "List every stored task.",
    },
    ToolSpec {
        name: "list_tasks",
        description: "List tasks matching the given filters.",
    },
    ToolSpec {
        name: "update_task",
        description: "Change fields on an existing task.",
    },
    ToolSpec {
        name: "complete_task",
        description: "Mark a task as done.",
    },
    ToolSpec {
        name: "add_sub_task",
        description: "Append a checklist item to a task.",
    },
    ToolSpec {
        name: "complete_sub_task",
        description: "Mark the first matching checklist item complete.",
    },
    ToolSpec {
        name: "delete_task",
        description: "Remove one task.",
    },
    ToolSpec {
        name: "remove_all_tasks",
        description: "Remove every stored task.",
    },
    ToolSpec {
        name: THINK_TOOL,
        description: "Record an intermediate thought without touching tasks.",
    },
];

/// Typed failure at the internal tool boundary. The display strings are the
/// exact texts the outward contract returns.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolError {
    #[error("Unknown tool '{0}'.")]
    UnknownTool(String),
    #[error("{0}")]
    BadArguments(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Task with ID '{id}' not found.")]
    TaskNotFound { id: String },
    #[error("Sub-task '{name}' not found in {task_id}.")]
    SubTaskNotFound { task_id: String, name: String },
}

impl From<StoreError> for ToolError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::TaskNotFound { id } => ToolError::TaskNotFound { id },
            StoreError::SubTaskNotFound { task_id, name } => {
                ToolError::SubTaskNotFound { task_id, name }
            }
            StoreError::Validation(error) => ToolError::Validation(error),
        }
    }
}

/// One-line task rendering shared by every tool response. Field order is
/// fixed: status tag, id, description, priority, then due date, tags, the
/// legacy singular subtask, subtasks, notes.
pub fn format_task(task: &Task) -> String {
    let mut parts = vec![format!(
        "[{}] {}: '{}' (priority {})",
        task.status.tag(),
        task.id,
        task.description,
        task.priority
    )];
    if let Some(due) = task.due_date {
        parts.push(format!("due {due}"));
    }
    if !task.tags.is_empty() {
        parts.push(format!("tags: {}", task.tags.join(", ")));
    }
    if let Some(legacy) = &task.sub_task {
        parts.push(format!(
            "subtask: '{}' (completed: {})",
            legacy.name, legacy.is_completed
        ));
    }
    if !task.sub_tasks.is_empty() {
        let rendered: Vec<String> = task
            .sub_tasks
            .iter()
            .map(|sub| {
                if sub.is_completed {
                    format!("{}✔", sub.name)
                } else {
                    sub.name.clone()
                }
            })
            .collect();
        parts.push(format!("subtasks: [{}]", rendered.join("; ")));
    }
    if let Some(notes) = task.notes.as_deref().filter(|notes| !notes.is_empty()) {
        parts.push(format!("notes: {notes}"));
    }
    parts.join(", ")
}

#[derive(Debug, Clone)]
pub struct ToolRegistry {
    store: TaskStore,
}

impl ToolRegistry {
    pub fn new(store: TaskStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    pub fn specs() -> &'static [ToolSpec] {
        TOOL_SPECS
    }

    pub fn is_tool(name: &str) -> bool {
        TOOL_SPECS.iter().any(|spec| spec.name == name)
    }

    /// Outward contract: always a status string, errors included.
    pub async fn invoke(&self, name: &str, args: &Value) -> String {
        match self.try_invoke(name, args).await {
            Ok(text) => text,
            Err(error) => error.to_string(),
        }
    }

    pub async fn try_invoke(&self, name: &str, args: &Value) -> Result<String, ToolError> {
        match name {
            TASK_FORM_TOOL => Ok(TASK_FORM_MARKER.to_string()),
            "add_task" => self.add_task(args).await,
            "process_tasks" => self.process_tasks(args).await,
            "get_task" => self.get_task(args).await,
            "get_tasks" => self.get_tasks().await,
            "list_tasks" => self.list_tasks(args).await,
            "update_task" => self.update_task(args).await,
            "complete_task" => self.complete_task(args).await,
            "add_sub_task" => self.add_sub_task(args).await,
            "complete_sub_task" => self.complete_sub_task(args).await,
            "delete_task" => self.delete_task(args).await,
            "remove_all_tasks" => self.remove_all_tasks().await,
            THINK_TOOL => self.think(args).await,
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }

    async fn add_task(&self, args: &Value) -> Result<String, ToolError> {
        let payload = args
            .get("task")
            .ok_or_else(|| ToolError::BadArguments("missing required argument 'task'".to_string()))?;
        let task = parse_task(payload)?;
        let line = format_task(&task);
        self.store.upsert(task).await;
        Ok(format!("Saved: {line}"))
    }

    async fn process_tasks(&self, args: &Value) -> Result<String, ToolError> {
        let items = args
            .get("tasks")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                ToolError::BadArguments("missing required argument 'tasks'".to_string())
            })?;
        let mut tasks = Vec::with_capacity(items.len());
        for item in items {
            tasks.push(parse_task(item)?);
        }
        let lines: Vec<String> = tasks.iter().map(format_task).collect();
        let count = tasks.len();
        self.store.upsert_many(tasks).await;
        Ok(format!("Processed {count} task(s):\n{}", lines.join("\n")))
    }

    async fn get_task(&self, args: &Value) -> Result<String, ToolError> {
        let id = required_str(args, "task_id")?;
        match self.store.get(id).await {
            Some(task) => Ok(format_task(&task)),
            None => Err(ToolError::TaskNotFound { id: id.to_string() }),
        }
    }

    async fn get_tasks(&self) -> Result<String, ToolError> {
        let tasks = self.store.list(&TaskFilter::default()).await;
        if tasks.is_empty() {
            return Ok("No tasks have been processed yet.".to_string());
        }
        Ok(tasks.iter().map(format_task).collect::<Vec<_>>().join("\n"))
    }

    async fn list_tasks(&self, args: &Value) -> Result<String, ToolError> {
        let filter = parse_filter(args)?;
        let tasks = self.store.list(&filter).await;
        if tasks.is_empty() {
            return Ok("No tasks match the given filters.".to_string());
        }
        Ok(tasks.iter().map(format_task).collect::<Vec<_>>().join("\n"))
    }

    async fn update_task(&self, args: &Value) -> Result<String, ToolError> {
        let id = required_str(args, "task_id")?;
        let patch = TaskPatch {
            description: optional_str(args, "description").map(str::to_string),
            priority: optional_i64(args, "priority")?,
            status: parse_status_arg(args)?,
            due_date: optional_str(args, "due_date").map(str::to_string),
            tags: optional_str_list(args, "tags")?,
            notes: optional_str(args, "notes").map(str::to_string),
        };
        let task = self.store.update(id, patch).await?;
        Ok(format!("Updated: {}", format_task(&task)))
    }

    async fn complete_task(&self, args: &Value) -> Result<String, ToolError> {
        let id = required_str(args, "task_id")?;
        let task = self.store.complete(id).await?;
        Ok(format!("Completed: {}", format_task(&task)))
    }

    async fn add_sub_task(&self, args: &Value) -> Result<String, ToolError> {
        let id = required_str(args, "task_id")?;
        let name = required_str(args, "sub_task_name")?;
        self.store.add_sub_task(id, name).await?;
        Ok(format!("Added sub-task to {id}: {name}"))
    }

    async fn complete_sub_task(&self, args: &Value) -> Result<String, ToolError> {
        let id = required_str(args, "task_id")?;
        let name = required_str(args, "sub_task_name")?;
        self.store.complete_sub_task(id, name).await?;
        Ok(format!("Completed sub-task '{name}' in {id}."))
    }

    async fn delete_task(&self, args: &Value) -> Result<String, ToolError> {
        let id = required_str(args, "task_id")?;
        let removed = self.store.delete(id).await?;
        Ok(format!("Deleted: {} ('{}')", removed.id, removed.description))
    }

    async fn remove_all_tasks(&self) -> Result<String, ToolError> {
        let count = self.store.clear().await;
        Ok(format!("Successfully removed all {count} task(s)."))
    }

    async fn think(&self, args: &Value) -> Result<String, ToolError> {
        let thought = required_str(args, "thought")?;
        Ok(self.store.push_thought(thought).await)
    }
}

/// Decodes and validates a full task payload. Due date and priority are
/// checked up front so the caller sees the canonical validation texts rather
/// than a serde decode message.
fn parse_task(value: &Value) -> Result<Task, ToolError> {
    if let Some(due) = value.get("due_date").and_then(Value::as_str) {
        validate_due_date(due).map_err(ToolError::Validation)?;
    }
    if let Some(priority) = value.get("priority").and_then(Value::as_i64) {
        validate_priority(priority)?;
    }
    let task: Task = serde_json::from_value(value.clone())
        .map_err(|error| ToolError::BadArguments(format!("invalid task payload: {error}")))?;
    task.validate()?;
    Ok(task)
}

fn parse_filter(args: &Value) -> Result<TaskFilter, ToolError> {
    let mut filter = TaskFilter::default();
    if let Some(raw) = optional_str(args, "filter_status") {
        filter.status = Some(raw.parse::<TaskStatus>().map_err(ToolError::BadArguments)?);
    }
    filter.min_priority = optional_i64(args, "min_priority")?.map(clamp_priority_bound);
    filter.max_priority = optional_i64(args, "max_priority")?.map(clamp_priority_bound);
    filter.tag = optional_str(args, "tag").map(str::to_string);
    // Unparseable filter dates are treated as unset, not as errors.
    filter.due_before = optional_str(args, "due_before")
        .and_then(|raw| validate_due_date(raw).ok())
        .flatten();
    filter.due_after = optional_str(args, "due_after")
        .and_then(|raw| validate_due_date(raw).ok())
        .flatten();
    filter.search = optional_str(args, "search").map(str::to_string);
    Ok(filter)
}

/// Filter bounds are permissive where record priorities are not: any number
/// is a usable bound, clamped into byte range.
fn clamp_priority_bound(value: i64) -> u8 {
    value.clamp(0, u8::MAX as i64) as u8
}

fn parse_status_arg(args: &Value) -> Result<Option<TaskStatus>, ToolError> {
    match optional_str(args, "status") {
        Some(raw) => Ok(Some(
            raw.parse::<TaskStatus>().map_err(ToolError::BadArguments)?,
        )),
        None => Ok(None),
    }
}

fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    args.get(key).and_then(Value::as_str).ok_or_else(|| {
        ToolError::BadArguments(format!("missing required argument '{key}'"))
    })
}

fn optional_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

/// Accepts numbers and numeric strings; reasoning processes are loose about
/// which they emit.
fn optional_i64(args: &Value, key: &str) -> Result<Option<i64>, ToolError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(number)) => number.as_i64().map(Some).ok_or_else(|| {
            ToolError::BadArguments(format!("argument '{key}' must be an integer"))
        }),
        Some(Value::String(raw)) => raw.trim().parse::<i64>().map(Some).map_err(|_| {
            ToolError::BadArguments(format!("argument '{key}' must be an integer"))
        }),
        Some(_) => Err(ToolError::BadArguments(format!(
            "argument '{key}' must be an integer"
        ))),
    }
}

fn optional_str_list(args: &Value, key: &str) -> Result<Option<Vec<String>>, ToolError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item.as_str() {
                    Some(text) => out.push(text.to_string()),
                    None => {
                        return Err(ToolError::BadArguments(format!(
                            "argument '{key}' must be a list of strings"
                        )))
                    }
                }
            }
            Ok(Some(out))
        }
        Some(_) => Err(ToolError::BadArguments(format!(
            "argument '{key}' must be a list of strings"
        ))),
    }
}
