use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::env::HostEnv;
use crate::task::{Task, normalize_text};
use crate::theme::Theme;

pub const TASKS_KEY: &str = "todo:v1";
pub const THEME_KEY: &str = "theme";

/// Best-effort bridge between the task list / theme and the host key-value store.
/// Reads never fail and writes never report failure to the caller.
#[derive(Debug)]
pub struct Persistence<E> {
    env: E,
}

impl<E: HostEnv> Persistence<E> {
    pub fn new(env: E) -> Self {
        Self { env }
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut E {
        &mut self.env
    }

    pub fn into_env(self) -> E {
        self.env
    }

    #[tracing::instrument(skip(self))]
    pub fn load_tasks(&self) -> Vec<Task> {
        let Some(raw) = self.env.get(TASKS_KEY) else {
            debug!(key = TASKS_KEY, "no stored task list");
            return Vec::new();
        };

        match serde_json::from_str::<Option<Vec<Task>>>(&raw) {
            Ok(Some(tasks)) => {
                let loaded = normalize_loaded(tasks);
                info!(count = loaded.len(), "loaded task list");
                loaded
            }
            Ok(None) => Vec::new(),
            Err(err) => {
                warn!(key = TASKS_KEY, error = %err, "stored task list unreadable; starting empty");
                Vec::new()
            }
        }
    }

    #[tracing::instrument(skip(self, tasks), fields(count = tasks.len()))]
    pub fn save_tasks(&mut self, tasks: &[Task]) {
        let serialized = match serde_json::to_string(tasks) {
            Ok(serialized) => serialized,
            Err(err) => {
                warn!(error = %err, "failed serializing task list; skipping save");
                return;
            }
        };
        if let Err(err) = self.env.set(TASKS_KEY, &serialized) {
            warn!(key = TASKS_KEY, error = %err, "failed saving task list");
        }
    }

    pub fn load_theme(&self) -> Option<Theme> {
        self.env.get(THEME_KEY).and_then(|raw| Theme::parse(&raw))
    }

    #[tracing::instrument(skip(self))]
    pub fn save_theme(&mut self, theme: Theme) {
        if let Err(err) = self.env.set(THEME_KEY, theme.storage_value()) {
            warn!(key = THEME_KEY, error = %err, "failed saving theme");
        }
    }

    pub fn prefers_dark(&self) -> bool {
        self.env.prefers_dark()
    }
}

/// Restores the task invariants on data read back from storage.
fn normalize_loaded(tasks: Vec<Task>) -> Vec<Task> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(tasks.len());

    for mut task in tasks {
        let Some(text) = normalize_text(&task.text) else {
            warn!(id = %task.id, "dropping stored task with empty text");
            continue;
        };
        if !seen.insert(task.id.clone()) {
            warn!(id = %task.id, "dropping stored task with duplicate id");
            continue;
        }

        task.text = text;
        if task.completed {
            task.completed_at = task.completed_at.or(Some(task.created_at));
        } else {
            task.completed_at = None;
        }
        out.push(task);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::{Persistence, TASKS_KEY, THEME_KEY};
    use crate::env::{HostEnv, MemoryEnv};
    use crate::task::Task;
    use crate::theme::Theme;

    fn sample() -> Vec<Task> {
        vec![
            Task::new("b".to_string(), "Walk dog".to_string(), 20).toggled(25),
            Task::new("a".to_string(), "Buy milk".to_string(), 10),
        ]
    }

    #[test]
    fn save_then_load_preserves_every_field_and_order() {
        let mut persistence = Persistence::new(MemoryEnv::new());
        let tasks = sample();
        persistence.save_tasks(&tasks);
        assert_eq!(persistence.load_tasks(), tasks);
    }

    #[test]
    fn garbage_payload_loads_empty() {
        for raw in ["not json", "{\"id\":1}", "[{\"id\":\"x\"}]", "42", "null", ""] {
            let persistence = Persistence::new(MemoryEnv::new().with_entry(TASKS_KEY, raw));
            assert!(persistence.load_tasks().is_empty(), "payload {raw:?}");
        }
    }

    #[test]
    fn missing_completed_at_is_accepted_and_repaired() {
        let raw = r#"[
            {"id":"a","text":" done ","completed":true,"createdAt":7},
            {"id":"b","text":"open","completed":false,"createdAt":8,"completedAt":99},
            {"id":"a","text":"dup","completed":false,"createdAt":9,"completedAt":null},
            {"id":"c","text":"   ","completed":false,"createdAt":10,"completedAt":null}
        ]"#;
        let persistence = Persistence::new(MemoryEnv::new().with_entry(TASKS_KEY, raw));

        let tasks = persistence.load_tasks();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].text, "done");
        assert_eq!(tasks[0].completed_at, Some(7));
        assert_eq!(tasks[1].id, "b");
        assert_eq!(tasks[1].completed_at, None);
    }

    #[test]
    fn write_failures_are_swallowed() {
        let mut env = MemoryEnv::new();
        env.fail_writes(true);
        let mut persistence = Persistence::new(env);

        persistence.save_tasks(&sample());
        persistence.save_theme(Theme::Dark);

        assert_eq!(persistence.env().get(TASKS_KEY), None);
        assert_eq!(persistence.load_theme(), None);
    }

    #[test]
    fn theme_uses_its_own_key() {
        let mut persistence = Persistence::new(MemoryEnv::new());
        persistence.save_theme(Theme::Dark);
        assert_eq!(persistence.env().get(THEME_KEY).as_deref(), Some("dark"));
        assert_eq!(persistence.load_theme(), Some(Theme::Dark));
        assert_eq!(persistence.env().get(TASKS_KEY), None);

        persistence.env_mut().set(THEME_KEY, "sepia").expect("set");
        assert_eq!(persistence.load_theme(), None);
    }
}
