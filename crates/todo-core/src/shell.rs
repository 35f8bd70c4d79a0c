use std::cell::RefCell;
use std::io::{BufRead, Write};
use std::rc::Rc;

use tracing::{debug, info};

use crate::cli::resolve_task_ref;
use crate::clock::Clock;
use crate::env::HostEnv;
use crate::notice::Notifier;
use crate::render::Renderer;
use crate::store::{EditOutcome, Snapshot, TaskStore};
use crate::theme::ThemeState;

const HELP: &str = "\
commands:
  add <text>      add a task at the top
  toggle <n>      complete / reopen task n
  rm <n>          delete task n
  edit <n>        start editing task n
  draft <text>    replace the draft of the task being edited
  save            commit the draft (blank deletes the task)
  cancel          drop the draft
  filter <name>   all | active | completed
  clear           delete completed tasks
  theme           switch light / dark
  list            redraw
  quit            leave";

/// Line-driven front end. Task numbers refer to the rows currently shown.
pub struct Shell<'a, E, C> {
    store: &'a mut TaskStore<E, C>,
    theme: &'a mut ThemeState,
    renderer: Renderer,
    notifier: Notifier,
    latest: Rc<RefCell<Option<Snapshot>>>,
}

enum Step {
    Continue { redraw: bool },
    Quit,
}

impl<'a, E: HostEnv, C: Clock> Shell<'a, E, C> {
    pub fn new(
        store: &'a mut TaskStore<E, C>,
        theme: &'a mut ThemeState,
        renderer: Renderer,
        notifier: Notifier,
    ) -> Self {
        Self {
            store,
            theme,
            renderer,
            notifier,
            latest: Rc::new(RefCell::new(None)),
        }
    }

    #[tracing::instrument(skip_all)]
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, mut output: W) -> anyhow::Result<()> {
        let latest = Rc::clone(&self.latest);
        let subscription = self.store.subscribe(move |snapshot| {
            *latest.borrow_mut() = Some(snapshot.clone());
        });
        info!("shell started");

        let result = self.drive(input, &mut output);

        self.store.unsubscribe(subscription);
        info!("shell finished");
        result
    }

    fn drive<R: BufRead, W: Write>(&mut self, input: R, output: &mut W) -> anyhow::Result<()> {
        self.draw(output, self.store.snapshot())?;

        let mut lines = input.lines();
        loop {
            write!(output, "> ")?;
            output.flush()?;

            let Some(line) = lines.next() else {
                writeln!(output)?;
                break;
            };
            let line = line?;

            match self.execute(line.trim(), output)? {
                Step::Quit => break,
                Step::Continue { redraw } => {
                    let changed = self.latest.borrow_mut().take();
                    match changed {
                        Some(snapshot) => self.draw(output, snapshot)?,
                        None if redraw => self.draw(output, self.store.snapshot())?,
                        None => {}
                    }
                }
            }
        }

        Ok(())
    }

    fn execute<W: Write>(&mut self, line: &str, output: &mut W) -> anyhow::Result<Step> {
        let (command, rest) = match line.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };
        debug!(command, "shell command");

        match command {
            "" => return Ok(Step::Continue { redraw: false }),
            "quit" | "exit" | "q" => return Ok(Step::Quit),
            "help" | "?" => {
                writeln!(output, "{HELP}")?;
                return Ok(Step::Continue { redraw: false });
            }
            "list" | "ls" => return Ok(Step::Continue { redraw: true }),
            "add" => match self.store.add(rest) {
                Some(_) => self.notify("Task added"),
                None => self.notify("Nothing to add"),
            },
            "toggle" | "done" => match self.visible_ref(rest) {
                Some(id) => match self.store.toggle(&id) {
                    Some(task) if task.completed => self.notify("Task completed"),
                    Some(_) => self.notify("Task reopened"),
                    None => self.notify("No such task"),
                },
                None => self.notify(format!("No task {rest}")),
            },
            "rm" | "remove" | "delete" => match self.visible_ref(rest) {
                Some(id) => {
                    self.store.remove(&id);
                    self.notify("Task removed");
                }
                None => self.notify(format!("No task {rest}")),
            },
            "edit" => match self.visible_ref(rest) {
                Some(id) => {
                    self.store.start_edit(&id);
                }
                None => self.notify(format!("No task {rest}")),
            },
            "draft" => {
                if !self.store.set_draft(rest) {
                    self.notify("Not editing");
                }
            }
            "save" => match self.store.commit_edit() {
                EditOutcome::Renamed(_) => self.notify("Task updated"),
                EditOutcome::Deleted(_) => self.notify("Task removed"),
                EditOutcome::Missing => self.notify("Task no longer exists"),
                EditOutcome::NoSession => self.notify("Not editing"),
            },
            "cancel" => {
                if self.store.cancel_edit() {
                    self.notify("Edit cancelled");
                } else {
                    self.notify("Not editing");
                }
            }
            "filter" => {
                if !self.store.set_filter_str(rest) {
                    self.notify(format!("Unknown filter: {rest}"));
                }
            }
            "clear" => match self.store.clear_completed() {
                0 => self.notify("Nothing to clear"),
                1 => self.notify("Cleared 1 completed task"),
                n => self.notify(format!("Cleared {n} completed tasks")),
            },
            "theme" => {
                let theme = self.theme.toggle(self.store.persistence_mut());
                self.renderer.set_theme(theme);
                self.notify(format!("Theme: {}", theme.storage_value()));
            }
            other => {
                writeln!(output, "unknown command: {other} (try help)")?;
                return Ok(Step::Continue { redraw: false });
            }
        }

        Ok(Step::Continue { redraw: true })
    }

    fn visible_ref(&self, raw: &str) -> Option<String> {
        resolve_task_ref(&self.store.visible_tasks(), raw)
    }

    fn notify(&mut self, message: impl Into<String>) {
        let now = self.store.clock().now_ms();
        self.notifier.show(message, now);
    }

    fn draw<W: Write>(&mut self, output: &mut W, snapshot: Snapshot) -> anyhow::Result<()> {
        let now = self.store.clock().now_ms();
        let notice = self.notifier.current(now).cloned();
        self.renderer.write_view(&mut *output, &snapshot, notice.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use chrono_tz::Tz;

    use super::Shell;
    use crate::clock::ManualClock;
    use crate::env::MemoryEnv;
    use crate::notice::Notifier;
    use crate::render::Renderer;
    use crate::store::TaskStore;
    use crate::theme::{Theme, ThemeState};

    fn run<'c>(
        script: &str,
        clock: &'c ManualClock,
    ) -> (String, TaskStore<MemoryEnv, &'c ManualClock>, Theme) {
        let mut store = TaskStore::open(MemoryEnv::new(), clock);
        let mut theme = ThemeState::load(store.persistence());
        let mut out = Vec::new();
        Shell::new(&mut store, &mut theme, Renderer::plain(Tz::UTC), Notifier::new(1_000))
            .run(script.as_bytes(), &mut out)
            .expect("shell run");
        (String::from_utf8(out).expect("utf8"), store, theme.current())
    }

    #[test]
    fn add_toggle_and_filter_round() {
        let clock = ManualClock::new(0);
        let (out, store, _) = run(
            "add Buy milk\nadd   \ntoggle 1\nfilter active\nfilter bogus\nquit\n",
            &clock,
        );

        assert!(out.contains("Task added"));
        assert!(out.contains("Nothing to add"));
        assert!(out.contains("Task completed"));
        assert!(out.contains("No active tasks."));
        assert!(out.contains("Unknown filter: bogus"));
        assert_eq!(store.len(), 1);
        assert!(store.tasks()[0].completed);
    }

    #[test]
    fn blank_draft_save_deletes_the_task() {
        let clock = ManualClock::new(0);
        let (out, store, _) = run("add Buy milk\nedit 1\ndraft\nsave\n", &clock);

        assert!(out.contains("editing #1: Buy milk"));
        assert!(out.contains("Task removed"));
        assert!(store.is_empty());
        assert_eq!(store.edit_session(), &crate::store::EditSession::Idle);
    }

    #[test]
    fn rename_and_theme_toggle() {
        let clock = ManualClock::new(0);
        let (out, store, theme) = run(
            "add Buy milk\nedit 1\ndraft Buy oat milk\nsave\ntheme\nnope\n",
            &clock,
        );

        assert!(out.contains("Task updated"));
        assert!(out.contains("Theme: dark"));
        assert!(out.contains("unknown command: nope"));
        assert_eq!(store.tasks()[0].text, "Buy oat milk");
        assert_eq!(theme, Theme::Dark);
        assert_eq!(store.persistence().load_theme(), Some(Theme::Dark));
    }
}
