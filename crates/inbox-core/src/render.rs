use std::io::{self, IsTerminal, Write};

use chrono::{DateTime, Local, Utc};
use unicode_width::UnicodeWidthStr;

use crate::compose::Draft;
use crate::config::Config;
use crate::task::{Category, CategorySource, Task};
use crate::view::{TabCounts, View};

pub const REVIEW_PROMPT: &str = "Low confidence - please review category";

pub fn tab_label(tab: Category) -> &'static str {
    match tab {
        Category::Urgent => "Urgent",
        Category::Lead => "Leads",
        Category::Invoice => "Admin",
        Category::Personal => "Personal / Other",
    }
}

pub fn empty_message(tab: Category) -> &'static str {
    match tab {
        Category::Urgent => "No urgent follow-ups right now.",
        Category::Lead => "No lead follow-ups right now.",
        Category::Invoice => "No invoice or admin follow-ups right now.",
        Category::Personal => "No personal follow-ups right now.",
    }
}

pub fn source_label(source: CategorySource) -> &'static str {
    match source {
        CategorySource::Rule => "Rule-based",
        CategorySource::Ai => "Categorized by AI",
        CategorySource::Manual => "Categorized manually",
    }
}

pub fn time_ago(created: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - created).num_seconds().max(0);
    let minutes = secs / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    let plural = |n: i64, unit: &str| {
        format!("{n} {unit}{} ago", if n == 1 { "" } else { "s" })
    };

    if days > 0 {
        plural(days, "day")
    } else if hours > 0 {
        plural(hours, "hour")
    } else if minutes > 0 {
        plural(minutes, "minute")
    } else {
        "Just now".to_string()
    }
}

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> Self {
        Self { color: cfg.color() }
    }

    #[tracing::instrument(skip(self, view, tasks, now))]
    pub fn print_inbox(
        &mut self,
        view: &View,
        tasks: &[Task],
        tab: Category,
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let out = io::stdout().lock();
        self.write_inbox(out, view, tasks, tab, now)
    }

    pub fn write_inbox<W: Write>(
        &self,
        mut out: W,
        view: &View,
        tasks: &[Task],
        tab: Category,
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let total = view.total_pending(tasks);
        writeln!(out, "{total} pending follow-up(s)")?;
        writeln!(out, "{}", self.tab_bar(&view.counts_by_tab(tasks), tab))?;
        writeln!(out)?;

        let rows = view.filter_by_tab(tasks, tab);
        if rows.is_empty() {
            writeln!(out, "{}", empty_message(tab))?;
            return Ok(());
        }

        self.write_task_rows(out, view, &rows, now)
    }

    #[tracing::instrument(skip(self, view, tasks, now))]
    pub fn print_review(
        &mut self,
        view: &View,
        tasks: &[Task],
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let rows = view.needs_review(tasks);
        if rows.is_empty() {
            writeln!(out, "Nothing to review.")?;
            return Ok(());
        }
        self.write_task_rows(out, view, &rows, now)
    }

    pub fn print_counts(&mut self, counts: &TabCounts) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let headers = vec!["Tab".to_string(), "Pending".to_string()];
        let mut rows: Vec<Vec<String>> = counts
            .iter()
            .map(|(tab, count)| vec![tab_label(tab).to_string(), count.to_string()])
            .collect();
        rows.push(vec!["Total".to_string(), counts.total().to_string()]);
        write_table(&mut out, headers, rows)
    }

    #[tracing::instrument(skip(self, view, task, now), fields(id = %task.id))]
    pub fn print_task_card(
        &mut self,
        view: &View,
        task: &Task,
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let out = io::stdout().lock();
        self.write_task_card(out, view, task, now)
    }

    pub fn write_task_card<W: Write>(
        &self,
        mut out: W,
        view: &View,
        task: &Task,
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let category = view.normalize_category(task);

        writeln!(out, "id        {}", task.id)?;
        writeln!(out, "lead      {}", task.lead_email)?;
        writeln!(out, "status    {}", task.status)?;
        writeln!(out, "category  {}", self.category_badge(category))?;
        if let Some(source) = task.category_source {
            writeln!(out, "source    {}", source_label(source))?;
        }
        if let Some(confidence) = task.category_confidence {
            writeln!(out, "conf.     {confidence:.2}")?;
        }
        writeln!(
            out,
            "created   {} ({})",
            task.created_at.with_timezone(&Local).format("%b %-d, %-I:%M %p"),
            time_ago(task.created_at, now)
        )?;
        if let Some(thread) = &task.thread_id {
            writeln!(out, "thread    {thread}")?;
        }
        writeln!(out, "reason    {}", task.reason)?;
        if view.is_low_confidence(task) {
            writeln!(out, "          {}", self.paint(REVIEW_PROMPT, "33"))?;
        }

        writeln!(out)?;
        writeln!(out, "Last message:")?;
        writeln!(out, "{}", task.last_body)?;

        let draft = Draft::for_task(task, None);
        writeln!(out)?;
        writeln!(out, "Suggested reply:")?;
        writeln!(out, "  to       {}", draft.to)?;
        writeln!(out, "  subject  {}", draft.subject)?;
        writeln!(out)?;
        writeln!(out, "{}", draft.body)?;
        Ok(())
    }

    fn write_task_rows<W: Write>(
        &self,
        out: W,
        view: &View,
        tasks: &[&Task],
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let headers = vec![
            "ID".to_string(),
            "Lead".to_string(),
            "Reason".to_string(),
            "Age".to_string(),
            "Review".to_string(),
        ];

        let rows = tasks
            .iter()
            .map(|task| {
                let review = if view.is_low_confidence(task) {
                    self.paint("review", "33")
                } else {
                    String::new()
                };
                vec![
                    self.paint(task.id.as_str(), "33"),
                    task.lead_email.clone(),
                    task.reason.clone(),
                    time_ago(task.created_at, now),
                    review,
                ]
            })
            .collect();

        write_table(out, headers, rows)
    }

    fn tab_bar(&self, counts: &TabCounts, active: Category) -> String {
        counts
            .iter()
            .map(|(tab, count)| {
                let mut label = tab_label(tab).to_string();
                if count > 0 {
                    label = format!("{label} ({count})");
                }
                if tab == active {
                    self.paint(&format!("[{label}]"), "1")
                } else {
                    label
                }
            })
            .collect::<Vec<_>>()
            .join("  ")
    }

    fn category_badge(&self, category: Category) -> String {
        let label = tab_label(category);
        match category {
            Category::Urgent => self.paint(label, "33"),
            Category::Invoice => self.paint(label, "35"),
            Category::Lead | Category::Personal => label.to_string(),
        }
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
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

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
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
