use std::io::{self, Write};

use anyhow::Context;
use tracing::{info, instrument, warn};

use crate::cli::{Command, ThemeAction, resolve_task_ref};
use crate::clock::Clock;
use crate::config::Config;
use crate::env::HostEnv;
use crate::notice::Notifier;
use crate::render::Renderer;
use crate::shell::Shell;
use crate::store::{EditOutcome, TaskStore};
use crate::theme::{Theme, ThemeState};

#[instrument(skip(store, theme, cfg, renderer, out))]
pub fn dispatch<E: HostEnv, C: Clock, W: Write>(
    store: &mut TaskStore<E, C>,
    theme: &mut ThemeState,
    cfg: &Config,
    renderer: &mut Renderer,
    command: Command,
    out: &mut W,
) -> anyhow::Result<()> {
    match command {
        Command::Add { text } => cmd_add(store, &text.join(" "), out),
        Command::List { filter } => {
            store.set_filter(filter);
            renderer.write_view(out, &store.snapshot(), None)
        }
        Command::Toggle { task } => cmd_toggle(store, &task, out),
        Command::Edit { task, text } => cmd_edit(store, &task, &text.join(" "), out),
        Command::Remove { task } => cmd_remove(store, &task, out),
        Command::ClearCompleted => {
            let removed = store.clear_completed();
            writeln!(out, "Cleared {removed} completed task(s).")?;
            Ok(())
        }
        Command::Theme { action } => cmd_theme(store, theme, renderer, action, out),
        Command::Export => {
            let json = serde_json::to_string_pretty(&*store.tasks())
                .context("failed to serialize task list")?;
            writeln!(out, "{json}")?;
            Ok(())
        }
        Command::Shell => {
            let notifier = Notifier::new(cfg.notice_delay_ms());
            let stdin = io::stdin();
            Shell::new(store, theme, renderer.clone(), notifier).run(stdin.lock(), out)
        }
    }
}

fn cmd_add<E: HostEnv, C: Clock, W: Write>(
    store: &mut TaskStore<E, C>,
    text: &str,
    out: &mut W,
) -> anyhow::Result<()> {
    match store.add(text) {
        Some(task) => {
            info!(id = %task.id, "command add");
            writeln!(out, "Added task {}: {}", task.id, task.text)?;
        }
        None => warn!("task text is empty; nothing added"),
    }
    Ok(())
}

fn cmd_toggle<E: HostEnv, C: Clock, W: Write>(
    store: &mut TaskStore<E, C>,
    reference: &str,
    out: &mut W,
) -> anyhow::Result<()> {
    let Some(id) = lookup(store, reference) else {
        return Ok(());
    };
    if let Some(task) = store.toggle(&id) {
        let state = if task.completed { "Completed" } else { "Reopened" };
        writeln!(out, "{state} task {}: {}", task.id, task.text)?;
    }
    Ok(())
}

fn cmd_edit<E: HostEnv, C: Clock, W: Write>(
    store: &mut TaskStore<E, C>,
    reference: &str,
    text: &str,
    out: &mut W,
) -> anyhow::Result<()> {
    let Some(id) = lookup(store, reference) else {
        return Ok(());
    };
    store.start_edit(&id);
    store.set_draft(text);
    match store.commit_edit() {
        EditOutcome::Renamed(task) => writeln!(out, "Updated task {}: {}", task.id, task.text)?,
        EditOutcome::Deleted(task) => writeln!(out, "Removed task {}: {}", task.id, task.text)?,
        EditOutcome::Missing | EditOutcome::NoSession => {
            warn!(reference, "task vanished before the edit was saved");
        }
    }
    Ok(())
}

fn cmd_remove<E: HostEnv, C: Clock, W: Write>(
    store: &mut TaskStore<E, C>,
    reference: &str,
    out: &mut W,
) -> anyhow::Result<()> {
    let Some(id) = lookup(store, reference) else {
        return Ok(());
    };
    if let Some(task) = store.remove(&id) {
        writeln!(out, "Removed task {}: {}", task.id, task.text)?;
    }
    Ok(())
}

fn cmd_theme<E: HostEnv, C: Clock, W: Write>(
    store: &mut TaskStore<E, C>,
    theme: &mut ThemeState,
    renderer: &mut Renderer,
    action: ThemeAction,
    out: &mut W,
) -> anyhow::Result<()> {
    let current = match action {
        ThemeAction::Show => theme.current(),
        ThemeAction::Toggle => theme.toggle(store.persistence_mut()),
        ThemeAction::Light => theme.set(store.persistence_mut(), Theme::Light),
        ThemeAction::Dark => theme.set(store.persistence_mut(), Theme::Dark),
    };
    renderer.set_theme(current);
    writeln!(out, "{}", current.storage_value())?;
    Ok(())
}

/// Unresolvable references are reported and turn the command into a no-op.
fn lookup<E: HostEnv, C: Clock>(store: &TaskStore<E, C>, reference: &str) -> Option<String> {
    let found = resolve_task_ref(&store.tasks(), reference);
    if found.is_none() {
        warn!(reference, "no single task matches");
        eprintln!("warning: no task matches '{reference}'");
    }
    found
}
