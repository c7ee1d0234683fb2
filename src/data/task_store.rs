use chrono::NaiveDate;
use serde_json::Value;
use uuid::Uuid;

use crate::core::task::{Priority, RawTask, Task, TaskDraft, TaskPatch, TaskStatus, DEFAULT_ASSIGNEE};
use crate::core::time;
use super::storage::{WriteLayer, TASKS_KEY};
use super::{DataService, Source};

/// Task collection with kanban queries and validated CRUD. The write
/// layer, once non-empty, supersedes the external snapshot in full.
#[derive(Default)]
pub struct TaskStore {
    tasks: Vec<Task>,
    loaded: bool,
    skipped: usize,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-derive the collection from the write layer or, failing that,
    /// the latest snapshot. Invalid records are skipped and counted,
    /// never fatal.
    pub fn load(&mut self, service: &DataService, storage: &WriteLayer) {
        self.tasks.clear();
        self.skipped = 0;

        if let Some(values) = storage.load_collection(TASKS_KEY) {
            let tasks = self.ingest_stored(values);
            if !tasks.is_empty() {
                self.tasks = tasks;
                self.loaded = true;
                log::info!(
                    "loaded {} tasks from write layer ({} invalid skipped)",
                    self.tasks.len(),
                    self.skipped
                );
                return;
            }
        }

        match service
            .get_data(Source::Tasks)
            .and_then(|data| data.get("tasks"))
            .and_then(Value::as_array)
        {
            Some(raw_tasks) => {
                self.ingest_snapshot(raw_tasks);
                log::info!(
                    "loaded {} tasks from snapshot ({} invalid skipped)",
                    self.tasks.len(),
                    self.skipped
                );
            }
            None => log::info!("no task data available — empty state"),
        }
        self.loaded = true;
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn by_status(&self, status: TaskStatus) -> Vec<&Task> {
        self.tasks.iter().filter(|t| t.status == status).collect()
    }

    pub fn due_on(&self, date: NaiveDate) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|t| t.due_date == Some(date))
            .collect()
    }

    pub fn by_assignee(&self, name: &str) -> Vec<&Task> {
        let name = name.to_lowercase();
        self.tasks
            .iter()
            .filter(|t| t.assignee.to_lowercase() == name)
            .collect()
    }

    /// Unique categories across current tasks, sorted.
    pub fn categories(&self) -> Vec<String> {
        let mut cats: Vec<String> = self
            .tasks
            .iter()
            .filter(|t| !t.category.is_empty())
            .map(|t| t.category.clone())
            .collect();
        cats.sort();
        cats.dedup();
        cats
    }

    pub fn active_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.is_active()).count()
    }

    pub fn critical_count(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| t.is_active() && t.priority == Priority::Critical)
            .count()
    }

    /// The n most recently touched tasks, newest first.
    pub fn recent(&self, n: usize) -> Vec<&Task> {
        let mut tasks: Vec<&Task> = self.tasks.iter().collect();
        tasks.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.created_at.cmp(&a.created_at)));
        tasks.truncate(n);
        tasks
    }

    /// Create a task with a fresh id and defaults. Validation failure
    /// rejects the draft without touching the collection.
    pub fn add(&mut self, storage: &WriteLayer, draft: TaskDraft) -> Option<Task> {
        let now = time::now();
        let status = draft.status.unwrap_or(TaskStatus::Backlog);
        let task = Task {
            id: Uuid::new_v4().to_string(),
            title: draft.title.trim().to_string(),
            description: draft.description,
            status,
            priority: draft.priority.unwrap_or(Priority::Medium),
            assignee: draft
                .assignee
                .map(|a| a.to_lowercase())
                .filter(|a| !a.is_empty())
                .unwrap_or_else(|| DEFAULT_ASSIGNEE.to_string()),
            category: draft.category,
            due_date: draft.due_date,
            created_at: now,
            updated_at: now,
            completed_at: status.is_done().then_some(now),
        };

        if let Err(e) = task.validate() {
            log::warn!("add task rejected: {}", e);
            return None;
        }

        self.tasks.push(task.clone());
        self.persist(storage);
        log::info!("added task: {}", task.title);
        Some(task)
    }

    /// Shallow-merge a patch over an existing task, re-deriving the
    /// completion stamp when the patch moves the task into or out of
    /// the done column. Unknown id and validation failure are both a
    /// no-op returning `None`.
    pub fn update(&mut self, storage: &WriteLayer, id: &str, patch: TaskPatch) -> Option<Task> {
        let Some(idx) = self.tasks.iter().position(|t| t.id == id) else {
            log::info!("update task: not found: {}", id);
            return None;
        };

        let mut task = self.tasks[idx].clone();
        if let Some(title) = patch.title {
            task.title = title;
        }
        if let Some(description) = patch.description {
            task.description = description;
        }
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        if let Some(assignee) = patch.assignee {
            task.assignee = assignee.to_lowercase();
        }
        if let Some(category) = patch.category {
            task.category = category;
        }
        if let Some(due_date) = patch.due_date {
            task.due_date = due_date;
        }
        task.updated_at = time::now();

        if let Some(status) = patch.status {
            task.status = status;
            if status.is_done() {
                if task.completed_at.is_none() {
                    task.completed_at = Some(task.updated_at);
                }
            } else {
                task.completed_at = None;
            }
        }

        if let Err(e) = task.validate() {
            log::warn!("update task rejected: {}", e);
            return None;
        }

        self.tasks[idx] = task.clone();
        self.persist(storage);
        log::info!("updated task: {} -> status:{}", task.title, task.status.as_str());
        Some(task)
    }

    /// Remove a task by id; removing an unknown id is a no-op.
    pub fn delete(&mut self, storage: &WriteLayer, id: &str) -> bool {
        let Some(idx) = self.tasks.iter().position(|t| t.id == id) else {
            return false;
        };
        let removed = self.tasks.remove(idx);
        self.persist(storage);
        log::info!("deleted task: {}", removed.title);
        true
    }

    fn ingest_snapshot(&mut self, raw_tasks: &[Value]) {
        let now = time::now();
        for value in raw_tasks {
            let raw: RawTask = match serde_json::from_value(value.clone()) {
                Ok(raw) => raw,
                Err(e) => {
                    self.skipped += 1;
                    log::debug!("skipped unreadable task record: {}", e);
                    continue;
                }
            };
            let id = raw.id.clone();
            match raw.normalize(now).and_then(|t| t.validate().map(|_| t)) {
                Ok(task) => self.tasks.push(task),
                Err(e) => {
                    self.skipped += 1;
                    log::debug!("skipped invalid task id={:?}: {}", id, e);
                }
            }
        }
    }

    fn ingest_stored(&mut self, values: Vec<Value>) -> Vec<Task> {
        let mut tasks = Vec::new();
        for value in values {
            match serde_json::from_value::<Task>(value)
                .map_err(|e| e.to_string())
                .and_then(|t| t.validate().map(|_| t).map_err(|e| e.to_string()))
            {
                Ok(task) => tasks.push(task),
                Err(e) => {
                    self.skipped += 1;
                    log::debug!("write layer: skipped invalid task: {}", e);
                }
            }
        }
        tasks
    }

    /// Whole-collection overwrite. A failed persist is logged and the
    /// in-memory mutation stands; the states reconverge on the next
    /// successful persist.
    fn persist(&self, storage: &WriteLayer) {
        if let Err(e) = storage.save_collection(TASKS_KEY, &self.tasks) {
            log::warn!("task persist failed: {}", e);
        }
    }
}
