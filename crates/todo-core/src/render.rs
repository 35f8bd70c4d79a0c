use std::io::{self, IsTerminal, Write};

use chrono_tz::Tz;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::filter::Filter;
use crate::notice::Notice;
use crate::store::{EditSession, Snapshot};
use crate::task::{Task, format_timestamp};
use crate::theme::Theme;

#[derive(Debug, Clone, Copy)]
struct Palette {
    index: &'static str,
    done: &'static str,
    accent: &'static str,
    notice: &'static str,
}

const LIGHT: Palette = Palette {
    index: "34",
    done: "2;32",
    accent: "35",
    notice: "30;42",
};

const DARK: Palette = Palette {
    index: "33",
    done: "2;36",
    accent: "95",
    notice: "30;105",
};

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
    palette: Palette,
    tz: Tz,
}

impl Renderer {
    pub fn new(cfg: &Config, theme: Theme) -> anyhow::Result<Self> {
        let color = cfg.get_bool("color")?.unwrap_or(true);

        let mut renderer = Self::plain(cfg.timezone());
        renderer.color = color && io::stdout().is_terminal();
        renderer.set_theme(theme);
        Ok(renderer)
    }

    /// Renderer without ANSI colors, for non-terminal output.
    pub fn plain(tz: Tz) -> Self {
        Self {
            color: false,
            palette: LIGHT,
            tz,
        }
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.palette = match theme {
            Theme::Light => LIGHT,
            Theme::Dark => DARK,
        };
    }

    #[tracing::instrument(skip_all, fields(count = snapshot.tasks.len()))]
    pub fn write_view<W: Write>(
        &self,
        mut out: W,
        snapshot: &Snapshot,
        notice: Option<&Notice>,
    ) -> anyhow::Result<()> {
        let visible: Vec<&Task> = snapshot.visible().collect();

        if visible.is_empty() {
            writeln!(out, "{}", empty_message(snapshot.filter, snapshot.tasks.is_empty()))?;
        } else {
            self.write_tasks(&mut out, &visible)?;
        }

        if let EditSession::Editing { id, draft } = &snapshot.session {
            let position = visible
                .iter()
                .position(|task| &task.id == id)
                .map(|idx| format!("#{}", idx + 1))
                .unwrap_or_else(|| "hidden task".to_string());
            writeln!(out, "{} {position}: {draft}", self.paint("editing", self.palette.accent))?;
        }

        writeln!(
            out,
            "{} remaining · filter: {}",
            snapshot.remaining,
            filter_bar(snapshot.filter)
        )?;

        if let Some(notice) = notice {
            writeln!(out, "{}", self.paint(&format!(" {} ", notice.message), self.palette.notice))?;
        }
        Ok(())
    }

    fn write_tasks<W: Write>(&self, out: &mut W, tasks: &[&Task]) -> anyhow::Result<()> {
        let headers = vec![
            "#".to_string(),
            "✓".to_string(),
            "Task".to_string(),
            "Created".to_string(),
            "Completed".to_string(),
        ];

        let rows = tasks
            .iter()
            .enumerate()
            .map(|(idx, task)| {
                let check = if task.completed { "[x]" } else { "[ ]" };
                let text = if task.completed {
                    self.paint(&task.text, self.palette.done)
                } else {
                    task.text.clone()
                };
                vec![
                    self.paint(&(idx + 1).to_string(), self.palette.index),
                    check.to_string(),
                    text,
                    format_timestamp(task.created_at, self.tz),
                    task.completed_at
                        .map(|at| format_timestamp(at, self.tz))
                        .unwrap_or_default(),
                ]
            })
            .collect();

        write_table(out, headers, rows)
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn empty_message(filter: Filter, list_empty: bool) -> &'static str {
    if list_empty {
        return "Nothing to do yet.";
    }
    match filter {
        Filter::All => "Nothing to do yet.",
        Filter::Active => "No active tasks.",
        Filter::Completed => "No completed tasks.",
    }
}

fn filter_bar(active: Filter) -> String {
    Filter::ALL
        .iter()
        .map(|filter| {
            if *filter == active {
                format!("[{}]", filter.label())
            } else {
                filter.label().to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    let header_line: Vec<String> = headers
        .iter()
        .zip(&widths)
        .map(|(header, width)| pad(header, *width))
        .collect();
    writeln!(writer, "{}", header_line.join(" ").trim_end())?;

    let rule: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();
    writeln!(writer, "{}", rule.join(" "))?;

    for row in rows {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, width)| pad(cell, *width))
            .collect();
        writeln!(writer, "{}", line.join(" ").trim_end())?;
    }

    Ok(())
}

fn pad(cell: &str, width: usize) -> String {
    let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
    format!("{cell}{}", " ".repeat(width.saturating_sub(visible_width)))
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono_tz::Tz;

    use super::{Renderer, strip_ansi};
    use crate::config::Config;
    use crate::filter::Filter;
    use crate::notice::Notice;
    use crate::store::{EditSession, Snapshot};
    use crate::task::Task;
    use crate::theme::Theme;

    fn snapshot(filter: Filter) -> Snapshot {
        let tasks = vec![
            Task::new("b".to_string(), "Café con leche".to_string(), 1_771_218_000_000),
            Task::new("a".to_string(), "Buy milk".to_string(), 1_771_218_000_000)
                .toggled(1_771_221_600_000),
        ];
        Snapshot {
            remaining: 1,
            tasks: Arc::from(tasks),
            filter,
            session: EditSession::Idle,
        }
    }

    fn render(snapshot: &Snapshot, notice: Option<&Notice>) -> String {
        let mut out = Vec::new();
        Renderer::plain(Tz::UTC)
            .write_view(&mut out, snapshot, notice)
            .expect("render");
        String::from_utf8(out).expect("utf8")
    }

    #[test]
    fn table_lists_visible_tasks_with_footer() {
        let text = render(&snapshot(Filter::All), None);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "# ✓   Task           Created           Completed");
        assert_eq!(lines[2], "1 [ ] Café con leche 16 Feb 2026 05:00");
        assert_eq!(
            lines[3],
            "2 [x] Buy milk       16 Feb 2026 05:00 16 Feb 2026 06:00"
        );
        assert_eq!(lines[4], "1 remaining · filter: [All] Active Completed");
    }

    #[test]
    fn empty_view_names_the_filter_and_shows_notice() {
        let mut snap = snapshot(Filter::Completed);
        snap.tasks = Arc::from(vec![Task::new("z".to_string(), "open".to_string(), 0)]);
        let notice = Notice {
            message: "Completed cleared".to_string(),
            shown_at: 0,
        };

        let text = render(&snap, Some(&notice));
        assert!(text.starts_with("No completed tasks.\n"));
        assert!(text.contains("All Active [Completed]"));
        assert!(text.ends_with(" Completed cleared \n"));
    }

    #[test]
    fn editing_line_points_at_visible_row() {
        let mut snap = snapshot(Filter::All);
        snap.session = EditSession::Editing {
            id: "a".to_string(),
            draft: "Buy oat milk".to_string(),
        };
        let text = render(&snap, None);
        assert!(text.contains("editing #2: Buy oat milk"));
    }

    #[test]
    fn color_setting_goes_through_config() {
        let mut cfg = Config::default();
        assert!(Renderer::new(&cfg, Theme::Dark).is_ok());

        cfg.apply_overrides(vec![("color".to_string(), "n".to_string())]);
        assert!(Renderer::new(&cfg, Theme::Light).is_ok());

        cfg.apply_overrides(vec![("rc.color".to_string(), "sometimes".to_string())]);
        let err = Renderer::new(&cfg, Theme::Light).expect_err("invalid color value");
        assert!(err.to_string().contains("invalid color setting"));
    }

    #[test]
    fn strip_ansi_removes_escape_sequences() {
        assert_eq!(strip_ansi("\x1b[33m1\x1b[0m"), "1");
    }
}
