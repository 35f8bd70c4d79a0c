use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::filter::Filter;
use crate::task::Task;

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "todo",
    version,
    about = "A small to-do list with filters, inline editing and themes",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "todorc")]
    pub todorc: Option<PathBuf>,

    #[arg(long = "data")]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Add a task at the top of the list
    Add {
        #[arg(required = true, num_args = 1.., allow_hyphen_values = true)]
        text: Vec<String>,
    },
    /// Show tasks
    #[command(alias = "ls")]
    List {
        #[arg(short, long, value_parser = parse_filter, default_value = "all")]
        filter: Filter,
    },
    /// Flip a task between active and completed
    #[command(alias = "done")]
    Toggle { task: String },
    /// Replace a task's text; blank text deletes the task
    Edit {
        task: String,
        #[arg(num_args = 0.., allow_hyphen_values = true)]
        text: Vec<String>,
    },
    /// Delete a task
    #[command(alias = "rm")]
    Remove { task: String },
    /// Delete every completed task
    ClearCompleted,
    /// Show or change the color theme
    Theme {
        #[arg(value_enum, default_value = "show")]
        action: ThemeAction,
    },
    /// Print the stored task list as JSON
    Export,
    /// Interactive session
    Shell,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeAction {
    Show,
    Toggle,
    Light,
    Dark,
}

fn parse_filter(raw: &str) -> Result<Filter, String> {
    raw.parse::<Filter>().map_err(|err| err.to_string())
}

impl Command {
    /// Maps a `default.command` config value onto a command without arguments.
    pub fn from_default(name: &str) -> anyhow::Result<Self> {
        match name.trim() {
            "list" | "ls" => Ok(Self::List { filter: Filter::All }),
            "shell" => Ok(Self::Shell),
            "export" => Ok(Self::Export),
            "theme" => Ok(Self::Theme {
                action: ThemeAction::Show,
            }),
            other => Err(anyhow!("unsupported default.command: {other}")),
        }
    }
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Pulls bare `rc.key=value` / `rc.key:value` arguments out before clap sees them.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    for arg in iter {
        let s = arg.to_string_lossy();
        if let Some(rest) = s.strip_prefix("rc.") {
            let parsed = rest
                .split_once('=')
                .or_else(|| rest.split_once(':'))
                .map(|(k, v)| (format!("rc.{k}"), v.to_string()));

            match parsed {
                Some(pair) => {
                    debug!(key = %pair.0, value = %pair.1, "captured rc override");
                    overrides.push(pair);
                }
                None => return Err(anyhow!("malformed rc override: {s}")),
            }
            continue;
        }
        cleaned.push(arg);
    }

    Ok(PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    })
}

/// Resolves a task reference against `tasks`. An all-digit reference is
/// only ever a 1-based position; anything else is an id prefix that must
/// match exactly one task.
pub fn resolve_task_ref(tasks: &[Task], raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if raw.bytes().all(|b| b.is_ascii_digit()) {
        let found = raw
            .parse::<usize>()
            .ok()
            .and_then(|position| position.checked_sub(1))
            .and_then(|idx| tasks.get(idx));
        if found.is_none() {
            debug!(position = %raw, count = tasks.len(), "position out of range");
        }
        return found.map(|task| task.id.clone());
    }

    let mut matches = tasks.iter().filter(|task| task.id.starts_with(raw));
    let first = matches.next()?;
    if matches.next().is_some() {
        debug!(prefix = %raw, "ambiguous task reference");
        None
    } else {
        Some(first.id.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;

    use clap::Parser;

    use super::{Command, GlobalCli, ThemeAction, preprocess_args, resolve_task_ref};
    use crate::filter::Filter;
    use crate::task::Task;

    fn args(raw: &[&str]) -> Vec<OsString> {
        raw.iter().map(OsString::from).collect()
    }

    #[test]
    fn rc_overrides_are_pulled_out() {
        let pre = preprocess_args(&args(&["todo", "rc.color=off", "list", "rc.timezone:UTC"]))
            .expect("preprocess");
        assert_eq!(pre.cleaned_args, args(&["todo", "list"]));
        assert_eq!(
            pre.rc_overrides,
            vec![
                ("rc.color".to_string(), "off".to_string()),
                ("rc.timezone".to_string(), "UTC".to_string()),
            ]
        );
        assert!(preprocess_args(&args(&["todo", "rc.color"])).is_err());
    }

    #[test]
    fn subcommands_parse() {
        let cli = GlobalCli::parse_from(["todo", "-vv", "add", "Buy", "milk"]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(
            cli.command,
            Some(Command::Add {
                text: vec!["Buy".to_string(), "milk".to_string()]
            })
        );

        let cli = GlobalCli::parse_from(["todo", "list", "--filter", "completed"]);
        assert_eq!(
            cli.command,
            Some(Command::List {
                filter: Filter::Completed
            })
        );

        let cli = GlobalCli::parse_from(["todo", "theme", "toggle"]);
        assert_eq!(
            cli.command,
            Some(Command::Theme {
                action: ThemeAction::Toggle
            })
        );

        assert!(GlobalCli::try_parse_from(["todo", "list", "--filter", "done"]).is_err());
    }

    #[test]
    fn task_refs_accept_positions_and_unique_prefixes() {
        let tasks = vec![
            Task::new("ab12".to_string(), "one".to_string(), 0),
            Task::new("ab34".to_string(), "two".to_string(), 0),
            Task::new("cd56".to_string(), "three".to_string(), 0),
        ];

        assert_eq!(resolve_task_ref(&tasks, "2").as_deref(), Some("ab34"));
        assert_eq!(resolve_task_ref(&tasks, "cd").as_deref(), Some("cd56"));
        assert_eq!(resolve_task_ref(&tasks, "ab"), None);
        assert_eq!(resolve_task_ref(&tasks, "0"), None);
        assert_eq!(resolve_task_ref(&tasks, "9"), None);
        assert_eq!(resolve_task_ref(&tasks, " "), None);
    }

    #[test]
    fn digit_refs_never_fall_back_to_id_prefixes() {
        let tasks = vec![
            Task::new(
                "77fa8e45-c26c-4819-8ea1-64b953b2d7cd".to_string(),
                "only".to_string(),
                0,
            ),
            Task::new("0b1c".to_string(), "zero-led".to_string(), 0),
        ];

        assert_eq!(resolve_task_ref(&tasks, "7"), None);
        assert_eq!(resolve_task_ref(&tasks, "77"), None);
        assert_eq!(resolve_task_ref(&tasks, "0"), None);
        assert_eq!(resolve_task_ref(&tasks, "99999999999999999999999"), None);
        assert_eq!(
            resolve_task_ref(&tasks, "1").as_deref(),
            Some("77fa8e45-c26c-4819-8ea1-64b953b2d7cd")
        );
        assert_eq!(resolve_task_ref(&tasks, "77fa").as_deref(), Some("77fa8e45-c26c-4819-8ea1-64b953b2d7cd"));
        assert_eq!(resolve_task_ref(&tasks, "0b").as_deref(), Some("0b1c"));
    }

    #[test]
    fn default_command_names() {
        assert_eq!(
            Command::from_default("list").ok(),
            Some(Command::List { filter: Filter::All })
        );
        assert!(Command::from_default("remove").is_err());
    }
}
