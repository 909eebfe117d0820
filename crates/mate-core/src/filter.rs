//! Filter engine for task queries.
//!
//! Every option is independently optional; an empty filter matches every
//! task and combined options are a logical AND.

use chrono::NaiveDate;

use crate::task::{Task, TaskStatus};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub min_priority: Option<u8>,
    pub max_priority: Option<u8>,
    pub tag: Option<String>,
    pub due_before: Option<NaiveDate>,
    pub due_after: Option<NaiveDate>,
    pub search: Option<String>,
}

impl TaskFilter {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.min_priority.is_none()
            && self.max_priority.is_none()
            && self.tag.is_none()
            && self.due_before.is_none()
            && self.due_after.is_none()
            && self.search.is_none()
    }

    pub fn matches(&self, task: &Task) -> bool {
        if let Some(status) = self.status {
            if task.status != status {
                return false;
            }
        }
        if let Some(min) = self.min_priority {
            if task.priority < min {
                return false;
            }
        }
        if let Some(max) = self.max_priority {
            if task.priority > max {
                return false;
            }
        }
        if let Some(tag) = &self.tag {
            if !task.tags.iter().any(|candidate| candidate == tag) {
                return false;
            }
        }
        // Date bounds are exclusive. A task with no deadline never fails a
        // date bound.
        if let Some(before) = self.due_before {
            if let Some(due) = task.due_date {
                if due >= before {
                    return false;
                }
            }
        }
        if let Some(after) = self.due_after {
            if let Some(due) = task.due_date {
                if due <= after {
                    return false;
                }
            }
        }
        if let Some(needle) = &self.search {
            if !search_haystack(task).contains(&needle.to_lowercase()) {
                return false;
            }
        }
        true
    }
}

/// Space-joined, lower-cased concatenation of id, description, tags, and
/// notes; the text the `search` option substring-matches against.
fn search_haystack(task: &Task) -> String {
    format!(
        "{} {} {} {}",
        task.id,
        task.description,
        task.tags.join(" "),
        task.notes.as_deref().unwrap_or_default()
    )
    .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Task;

    fn date(text: &str) -> NaiveDate {
        text.parse().expect("valid test date")
    }

    fn mk_task(id: &str, priority: u8) -> Task {
        Task::new(id, format!("Task {id}")).with_priority(priority)
    }

    #[test]
    fn empty_filter_matches_everything() {
        let filter = TaskFilter::default();
        assert!(filter.is_empty());
        assert!(filter.matches(&mk_task("t1", 1)));
        assert!(filter.matches(&mk_task("t2", 5)));
    }

    #[test]
    fn status_filter_is_exact() {
        let filter = TaskFilter {
            status: Some(TaskStatus::Done),
            ..TaskFilter::default()
        };
        assert!(!filter.matches(&mk_task("t1", 3)));
        let mut done = mk_task("t2", 3);
        done.mark_done();
        assert!(filter.matches(&done));
    }

    #[test]
    fn priority_bounds_are_inclusive() {
        let filter = TaskFilter {
            min_priority: Some(2),
            max_priority: Some(4),
            ..TaskFilter::default()
        };
        assert!(!filter.matches(&mk_task("p1", 1)));
        assert!(filter.matches(&mk_task("p2", 2)));
        assert!(filter.matches(&mk_task("p4", 4)));
        assert!(!filter.matches(&mk_task("p5", 5)));
    }

    #[test]
    fn tag_filter_is_case_sensitive_membership() {
        let task = mk_task("t1", 3).with_tags(vec!["Home".to_string(), "errand".to_string()]);
        let hit = TaskFilter {
            tag: Some("errand".to_string()),
            ..TaskFilter::default()
        };
        assert!(hit.matches(&task));
        let miss = TaskFilter {
            tag: Some("home".to_string()),
            ..TaskFilter::default()
        };
        assert!(!miss.matches(&task));
    }

    #[test]
    fn due_bounds_are_exclusive() {
        let task = mk_task("t1", 3).with_due_date(date("2026-06-15"));
        let before = |bound: &str| TaskFilter {
            due_before: Some(date(bound)),
            ..TaskFilter::default()
        };
        assert!(before("2026-06-16").matches(&task));
        assert!(!before("2026-06-15").matches(&task));
        assert!(!before("2026-06-14").matches(&task));

        let after = |bound: &str| TaskFilter {
            due_after: Some(date(bound)),
            ..TaskFilter::default()
        };
        assert!(after("2026-06-14").matches(&task));
        assert!(!after("2026-06-15").matches(&task));
        assert!(!after("2026-06-16").matches(&task));
    }

    #[test]
    fn tasks_without_due_date_pass_date_bounds() {
        let task = mk_task("t1", 3);
        let filter = TaskFilter {
            due_before: Some(date("2020-01-01")),
            due_after: Some(date("2030-01-01")),
            ..TaskFilter::default()
        };
        assert!(filter.matches(&task));
    }

    #[test]
    fn search_is_caseless_across_fields() {
        let task = mk_task("Groceries-1", 3)
            .with_tags(vec!["Errand".to_string()])
            .with_notes("pick up OAT milk");
        let matches = |needle: &str| {
            TaskFilter {
                search: Some(needle.to_string()),
                ..TaskFilter::default()
            }
            .matches(&task)
        };
        assert!(matches("groceries"));
        assert!(matches("errand"));
        assert!(matches("oat MILK"));
        assert!(!matches("dairy"));
    }

    #[test]
    fn combined_options_are_anded() {
        let task = mk_task("t1", 2)
            .with_tags(vec!["work".to_string()])
            .with_due_date(date("2026-02-01"));
        let mut filter = TaskFilter {
            min_priority: Some(2),
            tag: Some("work".to_string()),
            due_before: Some(date("2026-03-01")),
            ..TaskFilter::default()
        };
        assert!(filter.matches(&task));
        filter.status = Some(TaskStatus::Done);
        assert!(!filter.matches(&task));
    }
}
