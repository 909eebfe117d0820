//! Shared task store: in-memory map with write-through JSON persistence.
//!
//! One store instance is shared across every conversation turn. Mutations
//! take the write lock around the whole read-modify-write-persist sequence;
//! reads clone out under the read lock. Persistence failures are logged and
//! recovered locally so a broken disk never fails a turn.

use mate_core::{validate_due_date, validate_priority, Task, TaskFilter, TaskStatus, ValidationError};
use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("task '{id}' not found")]
    TaskNotFound { id: String },
    #[error("sub-task '{name}' not found in task '{task_id}'")]
    SubTaskNotFound { task_id: String, name: String },
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

#[derive(Debug, thiserror::Error)]
enum PersistError {
    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
    #[error("json error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
}

#[derive(Debug, thiserror::Error)]
enum LoadError {
    #[error("json error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
    #[error("invalid record: {source}")]
    Record {
        #[from]
        source: ValidationError,
    },
}

/// Partial update applied by [`TaskStore::update`]. Unset fields are left
/// untouched; an empty `due_date` string clears the deadline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub description: Option<String>,
    pub priority: Option<i64>,
    pub status: Option<TaskStatus>,
    pub due_date: Option<String>,
    pub tags: Option<Vec<String>>,
    pub notes: Option<String>,
}

#[derive(Debug, Default)]
struct StoreInner {
    tasks: Vec<Task>,
    thoughts: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct TaskStore {
    inner: Arc<RwLock<StoreInner>>,
    path: Option<PathBuf>,
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl TaskStore {
    /// Opens the store backed by `path`, loading whatever the file holds.
    /// A missing or corrupt file starts the store empty; opening never
    /// fails.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let tasks = load_tasks(&path);
        Self {
            inner: Arc::new(RwLock::new(StoreInner {
                tasks,
                thoughts: Vec::new(),
            })),
            path: Some(path),
        }
    }

    /// Store without a backing file, for tests and ephemeral runs.
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(RwLock::new(StoreInner::default())),
            path: None,
        }
    }

    /// Inserts or replaces by id. A replaced record keeps its position in
    /// iteration order; new ids append.
    pub async fn upsert(&self, task: Task) {
        let mut guard = self.inner.write().await;
        match guard.tasks.iter_mut().find(|existing| existing.id == task.id) {
            Some(slot) => *slot = task,
            None => guard.tasks.push(task),
        }
        self.persist(&guard);
    }

    /// Bulk [`upsert`](Self::upsert) under one lock, with a single
    /// persistence write at the end.
    pub async fn upsert_many(&self, tasks: Vec<Task>) {
        let mut guard = self.inner.write().await;
        for task in tasks {
            match guard.tasks.iter_mut().find(|existing| existing.id == task.id) {
                Some(slot) => *slot = task,
                None => guard.tasks.push(task),
            }
        }
        self.persist(&guard);
    }

    pub async fn get(&self, id: &str) -> Option<Task> {
        let guard = self.inner.read().await;
        guard.tasks.iter().find(|task| task.id.as_ref() == id).cloned()
    }

    /// Tasks matching `filter`, in insertion order.
    pub async fn list(&self, filter: &TaskFilter) -> Vec<Task> {
        let guard = self.inner.read().await;
        guard
            .tasks
            .iter()
            .filter(|task| filter.matches(task))
            .cloned()
            .collect()
    }

    /// Applies the supplied fields only. Validation runs before the record
    /// is touched, so a failed update performs no partial write.
    pub async fn update(&self, id: &str, patch: TaskPatch) -> Result<Task, StoreError> {
        let priority = patch.priority.map(validate_priority).transpose()?;
        let due_date = patch
            .due_date
            .as_deref()
            .map(validate_due_date)
            .transpose()?;

        let mut guard = self.inner.write().await;
        let task = guard
            .tasks
            .iter_mut()
            .find(|task| task.id.as_ref() == id)
            .ok_or_else(|| StoreError::TaskNotFound { id: id.to_string() })?;

        if let Some(description) = patch.description {
            task.description = description;
        }
        if let Some(priority) = priority {
            task.priority = priority;
        }
        if let Some(status) = patch.status {
            task.status = status;
        }
        if let Some(due) = due_date {
            task.due_date = due;
        }
        if let Some(tags) = patch.tags {
            task.tags = tags;
        }
        if let Some(notes) = patch.notes {
            task.notes = Some(notes);
        }

        let updated = task.clone();
        self.persist(&guard);
        Ok(updated)
    }

    pub async fn complete(&self, id: &str) -> Result<Task, StoreError> {
        let mut guard = self.inner.write().await;
        let task = guard
            .tasks
            .iter_mut()
            .find(|task| task.id.as_ref() == id)
            .ok_or_else(|| StoreError::TaskNotFound { id: id.to_string() })?;
        task.mark_done();
        let updated = task.clone();
        self.persist(&guard);
        Ok(updated)
    }

    /// Appends a subtask. Names are not checked for uniqueness.
    pub async fn add_sub_task(&self, id: &str, name: &str) -> Result<Task, StoreError> {
        let mut guard = self.inner.write().await;
        let task = guard
            .tasks
            .iter_mut()
            .find(|task| task.id.as_ref() == id)
            .ok_or_else(|| StoreError::TaskNotFound { id: id.to_string() })?;
        task.sub_tasks.push(mate_core::SubTask::new(name));
        let updated = task.clone();
        self.persist(&guard);
        Ok(updated)
    }

    /// Completes the first subtask with a matching name; later duplicates
    /// are untouched.
    pub async fn complete_sub_task(&self, id: &str, name: &str) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        let task = guard
            .tasks
            .iter_mut()
            .find(|task| task.id.as_ref() == id)
            .ok_or_else(|| StoreError::TaskNotFound { id: id.to_string() })?;
        let sub = task
            .sub_tasks
            .iter_mut()
            .find(|sub| sub.name == name)
            .ok_or_else(|| StoreError::SubTaskNotFound {
                task_id: id.to_string(),
                name: name.to_string(),
            })?;
        sub.is_completed = true;
        self.persist(&guard);
        Ok(())
    }

    /// Removes and returns the record.
    pub async fn delete(&self, id: &str) -> Result<Task, StoreError> {
        let mut guard = self.inner.write().await;
        let position = guard
            .tasks
            .iter()
            .position(|task| task.id.as_ref() == id)
            .ok_or_else(|| StoreError::TaskNotFound { id: id.to_string() })?;
        let removed = guard.tasks.remove(position);
        self.persist(&guard);
        Ok(removed)
    }

    /// Removes every record, returning how many were dropped.
    pub async fn clear(&self) -> usize {
        let mut guard = self.inner.write().await;
        let count = guard.tasks.len();
        guard.tasks.clear();
        self.persist(&guard);
        count
    }

    /// Appends to the in-memory thought log and echoes the entry back.
    /// Thoughts are intentionally not persisted.
    pub async fn push_thought(&self, thought: impl Into<String>) -> String {
        let thought = thought.into();
        let mut guard = self.inner.write().await;
        guard.thoughts.push(thought.clone());
        thought
    }

    pub async fn thoughts(&self) -> Vec<String> {
        let guard = self.inner.read().await;
        guard.thoughts.clone()
    }

    fn persist(&self, inner: &StoreInner) {
        let Some(path) = &self.path else { return };
        if let Err(error) = write_tasks(path, &inner.tasks) {
            eprintln!(
                "[store] failed to persist tasks to {}: {error}",
                path.display()
            );
        }
    }
}

fn write_tasks(path: &Path, tasks: &[Task]) -> Result<(), PersistError> {
    let mut map = serde_json::Map::new();
    for task in tasks {
        map.insert(task.id.0.clone(), serde_json::to_value(task)?);
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let body = serde_json::to_string_pretty(&Value::Object(map))?;
    fs::write(path, body)?;
    Ok(())
}

fn load_tasks(path: &Path) -> Vec<Task> {
    let body = match fs::read_to_string(path) {
        Ok(body) => body,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Vec::new(),
        Err(error) => {
            eprintln!("[store] failed to read {}: {error}", path.display());
            return Vec::new();
        }
    };
    match parse_tasks(&body) {
        Ok(tasks) => tasks,
        Err(error) => {
            eprintln!(
                "[store] ignoring corrupt task file {}: {error}",
                path.display()
            );
            Vec::new()
        }
    }
}

fn parse_tasks(body: &str) -> Result<Vec<Task>, LoadError> {
    // serde_json's preserve_order feature keeps the file's key order, so
    // insertion order survives a restart.
    let map: serde_json::Map<String, Value> = serde_json::from_str(body)?;
    let mut tasks = Vec::with_capacity(map.len());
    for (_, value) in map {
        let task: Task = serde_json::from_value(value)?;
        task.validate()?;
        tasks.push(task);
    }
    Ok(tasks)
}
