use std::sync::Arc;

use tracing::{debug, info};

use crate::clock::Clock;
use crate::env::HostEnv;
use crate::filter::Filter;
use crate::persist::Persistence;
use crate::task::{Task, normalize_text};

/// Rename session over at most one task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum EditSession {
    #[default]
    Idle,
    Editing { id: String, draft: String },
}

impl EditSession {
    pub fn target(&self) -> Option<&str> {
        match self {
            Self::Idle => None,
            Self::Editing { id, .. } => Some(id.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    Renamed(Task),
    /// The draft was blank, so the task was deleted.
    Deleted(Task),
    /// The session's task was already gone.
    Missing,
    NoSession,
}

/// State handed to subscribers after every change.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub tasks: Arc<[Task]>,
    pub filter: Filter,
    pub session: EditSession,
    pub remaining: usize,
}

impl Snapshot {
    pub fn visible(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(|task| self.filter.matches(task))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

type Observer = Box<dyn FnMut(&Snapshot)>;

/// Owns the task list, the view filter and the edit session.
///
/// The list is never mutated in place: every change installs a fresh
/// `Arc<[Task]>`, so a snapshot obtained from [`TaskStore::tasks`] stays stable.
/// Operations naming an unknown id are no-ops.
pub struct TaskStore<E, C> {
    persistence: Persistence<E>,
    clock: C,
    tasks: Arc<[Task]>,
    filter: Filter,
    session: EditSession,
    observers: Vec<(SubscriptionId, Observer)>,
    next_subscription: u64,
}

impl<E: HostEnv, C: Clock> TaskStore<E, C> {
    #[tracing::instrument(skip_all)]
    pub fn open(env: E, clock: C) -> Self {
        let persistence = Persistence::new(env);
        let tasks = persistence.load_tasks();
        info!(count = tasks.len(), "opened task store");

        Self {
            persistence,
            clock,
            tasks: Arc::from(tasks),
            filter: Filter::All,
            session: EditSession::Idle,
            observers: Vec::new(),
            next_subscription: 1,
        }
    }

    pub fn tasks(&self) -> Arc<[Task]> {
        Arc::clone(&self.tasks)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn find(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn filter(&self) -> Filter {
        self.filter
    }

    pub fn edit_session(&self) -> &EditSession {
        &self.session
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn persistence(&self) -> &Persistence<E> {
        &self.persistence
    }

    pub fn persistence_mut(&mut self) -> &mut Persistence<E> {
        &mut self.persistence
    }

    pub fn into_persistence(self) -> Persistence<E> {
        self.persistence
    }

    pub fn visible_tasks(&self) -> Vec<Task> {
        self.tasks
            .iter()
            .filter(|task| self.filter.matches(task))
            .cloned()
            .collect()
    }

    pub fn remaining_count(&self) -> usize {
        self.tasks.iter().filter(|task| task.is_active()).count()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            tasks: self.tasks(),
            filter: self.filter,
            session: self.session.clone(),
            remaining: self.remaining_count(),
        }
    }

    pub fn subscribe<F>(&mut self, observer: F) -> SubscriptionId
    where
        F: FnMut(&Snapshot) + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(existing, _)| *existing != id);
        self.observers.len() != before
    }

    #[tracing::instrument(skip(self, raw))]
    pub fn add(&mut self, raw: &str) -> Option<Task> {
        let text = normalize_text(raw)?;
        let task = Task::new(self.clock.new_id(), text, self.clock.now_ms());
        debug!(id = %task.id, "adding task");

        let next: Vec<Task> = std::iter::once(task.clone())
            .chain(self.tasks.iter().cloned())
            .collect();
        self.install(next);
        Some(task)
    }

    #[tracing::instrument(skip(self))]
    pub fn toggle(&mut self, id: &str) -> Option<Task> {
        let now = self.clock.now_ms();
        let mut toggled = None;
        let next: Vec<Task> = self
            .tasks
            .iter()
            .map(|task| {
                if task.id == id {
                    let flipped = task.toggled(now);
                    toggled = Some(flipped.clone());
                    flipped
                } else {
                    task.clone()
                }
            })
            .collect();

        let toggled = toggled?;
        debug!(completed = toggled.completed, "toggled task");
        self.install(next);
        Some(toggled)
    }

    #[tracing::instrument(skip(self))]
    pub fn remove(&mut self, id: &str) -> Option<Task> {
        let removed = self.find(id).cloned()?;
        let next: Vec<Task> = self
            .tasks
            .iter()
            .filter(|task| task.id != id)
            .cloned()
            .collect();
        debug!("removed task");
        self.install(next);
        Some(removed)
    }

    /// Removes every completed task and returns how many went away.
    #[tracing::instrument(skip(self))]
    pub fn clear_completed(&mut self) -> usize {
        let next: Vec<Task> = self
            .tasks
            .iter()
            .filter(|task| task.is_active())
            .cloned()
            .collect();
        let removed = self.tasks.len() - next.len();
        if removed == 0 {
            return 0;
        }
        info!(removed, "cleared completed tasks");
        self.install(next);
        removed
    }

    pub fn set_filter(&mut self, filter: Filter) {
        if self.filter == filter {
            return;
        }
        debug!(from = %self.filter, to = %filter, "filter changed");
        self.filter = filter;
        self.notify();
    }

    /// Returns `false` (leaving state alone) for names that are not a filter.
    pub fn set_filter_str(&mut self, name: &str) -> bool {
        match name.parse::<Filter>() {
            Ok(filter) => {
                self.set_filter(filter);
                true
            }
            Err(err) => {
                debug!(error = %err, "rejected filter");
                false
            }
        }
    }

    /// Opens a session on `id` with its current text as the draft, discarding
    /// any other session. Unknown ids leave the current session as is.
    #[tracing::instrument(skip(self))]
    pub fn start_edit(&mut self, id: &str) -> bool {
        let Some(task) = self.find(id) else {
            return false;
        };
        self.session = EditSession::Editing {
            id: task.id.clone(),
            draft: task.text.clone(),
        };
        self.notify();
        true
    }

    pub fn set_draft(&mut self, text: &str) -> bool {
        let EditSession::Editing { draft, .. } = &mut self.session else {
            return false;
        };
        *draft = text.to_string();
        self.notify();
        true
    }

    #[tracing::instrument(skip(self))]
    pub fn commit_edit(&mut self) -> EditOutcome {
        let EditSession::Editing { id, draft } = std::mem::take(&mut self.session) else {
            return EditOutcome::NoSession;
        };

        let outcome = match (self.find(&id).cloned(), normalize_text(&draft)) {
            (None, _) => EditOutcome::Missing,
            (Some(task), None) => {
                let next: Vec<Task> = self
                    .tasks
                    .iter()
                    .filter(|existing| existing.id != id)
                    .cloned()
                    .collect();
                self.install(next);
                EditOutcome::Deleted(task)
            }
            (Some(task), Some(text)) => {
                let renamed = task.with_text(text);
                let next: Vec<Task> = self
                    .tasks
                    .iter()
                    .map(|existing| {
                        if existing.id == id {
                            renamed.clone()
                        } else {
                            existing.clone()
                        }
                    })
                    .collect();
                self.install(next);
                EditOutcome::Renamed(renamed)
            }
        };

        if outcome == EditOutcome::Missing {
            self.notify();
        }
        debug!(?outcome, "edit committed");
        outcome
    }

    pub fn cancel_edit(&mut self) -> bool {
        if self.session == EditSession::Idle {
            return false;
        }
        self.session = EditSession::Idle;
        self.notify();
        true
    }

    fn install(&mut self, next: Vec<Task>) {
        self.tasks = Arc::from(next);

        if let Some(target) = self.session.target()
            && self.find(target).is_none()
        {
            debug!(id = %target, "edited task is gone; closing session");
            self.session = EditSession::Idle;
        }

        self.persistence.save_tasks(&self.tasks);
        self.notify();
    }

    fn notify(&mut self) {
        if self.observers.is_empty() {
            return;
        }
        let snapshot = self.snapshot();
        for (_, observer) in self.observers.iter_mut() {
            observer(&snapshot);
        }
    }
}
