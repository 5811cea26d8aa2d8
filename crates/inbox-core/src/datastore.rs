use std::collections::HashSet;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::task::{Category, CategorySource, Status, Task, TaskId};

pub const DATA_FILE: &str = "followups.data";

/// The reads and writes the lifecycle layer performs on the follow-up table.
pub trait FollowupTable {
    /// Pending rows, oldest first. Rows sharing a timestamp keep table order.
    fn load_pending(&self) -> anyhow::Result<Vec<Task>>;

    fn get(&self, id: &TaskId) -> anyhow::Result<Option<Task>>;

    /// Sets `status` on the row with this id. Returns false when no row matched.
    fn set_status(&self, id: &TaskId, status: Status) -> anyhow::Result<bool>;

    /// Sets the `category`/`category_source` pair on the row with this id.
    fn set_category(
        &self,
        id: &TaskId,
        category: Category,
        source: CategorySource,
    ) -> anyhow::Result<bool>;
}

/// The follow-up table: one JSON row per line, keyed by task id.
#[derive(Debug)]
pub struct DataStore {
    pub data_dir: PathBuf,
    pub data_path: PathBuf,
}

/// A stored line. Lines that fail to parse are carried through rewrites untouched.
#[derive(Debug)]
enum Row {
    Task(Task),
    Unreadable(String),
}

impl DataStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let data_path = data_dir.join(DATA_FILE);
        if !data_path.exists() {
            fs::write(&data_path, "")
                .with_context(|| format!("failed to create {}", data_path.display()))?;
        }

        info!(
            data_dir = %data_dir.display(),
            data = %data_path.display(),
            "opened datastore"
        );

        Ok(Self {
            data_dir,
            data_path,
        })
    }

    /// Every readable row. Unreadable rows are logged and skipped.
    #[tracing::instrument(skip(self))]
    pub fn load_all(&self) -> anyhow::Result<Vec<Task>> {
        Ok(self
            .load_rows()?
            .into_iter()
            .filter_map(|row| match row {
                Row::Task(task) => Some(task),
                Row::Unreadable(_) => None,
            })
            .collect())
    }

    /// Appends rows on behalf of the upstream categorization pipeline.
    #[tracing::instrument(skip(self, tasks), fields(count = tasks.len()))]
    pub fn insert(&self, tasks: Vec<Task>) -> anyhow::Result<()> {
        let mut rows = self.load_rows()?;
        let mut seen: HashSet<TaskId> = rows
            .iter()
            .filter_map(|row| match row {
                Row::Task(task) => Some(task.id.clone()),
                Row::Unreadable(_) => None,
            })
            .collect();

        for task in &tasks {
            if task.lead_email.trim().is_empty() {
                return Err(anyhow!("task {} has an empty lead email", task.id));
            }
            if !seen.insert(task.id.clone()) {
                return Err(anyhow!("duplicate task id: {}", task.id));
            }
        }

        rows.extend(tasks.into_iter().map(Row::Task));
        self.save_rows(&rows)
    }

    fn load_rows(&self) -> anyhow::Result<Vec<Row>> {
        load_jsonl(&self.data_path).with_context(|| format!("failed to load {DATA_FILE}"))
    }

    fn save_rows(&self, rows: &[Row]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.data_path, rows).with_context(|| format!("failed to save {DATA_FILE}"))
    }

    fn update(&self, id: &TaskId, apply: impl FnOnce(&mut Task)) -> anyhow::Result<bool> {
        let mut rows = self.load_rows()?;
        let Some(task) = rows.iter_mut().find_map(|row| match row {
            Row::Task(task) if &task.id == id => Some(task),
            _ => None,
        }) else {
            debug!("no row matched update");
            return Ok(false);
        };

        apply(task);
        self.save_rows(&rows)?;
        Ok(true)
    }
}

impl FollowupTable for DataStore {
    #[tracing::instrument(skip(self))]
    fn load_pending(&self) -> anyhow::Result<Vec<Task>> {
        let mut pending: Vec<Task> = self
            .load_all()?
            .into_iter()
            .filter(Task::is_pending)
            .collect();
        pending.sort_by_key(|task| task.created_at);
        debug!(count = pending.len(), "loaded pending follow-ups");
        Ok(pending)
    }

    #[tracing::instrument(skip(self), fields(id = %id))]
    fn get(&self, id: &TaskId) -> anyhow::Result<Option<Task>> {
        Ok(self.load_all()?.into_iter().find(|task| &task.id == id))
    }

    #[tracing::instrument(skip(self), fields(id = %id, status = %status))]
    fn set_status(&self, id: &TaskId, status: Status) -> anyhow::Result<bool> {
        self.update(id, |task| task.status = status)
    }

    #[tracing::instrument(skip(self), fields(id = %id, category = %category))]
    fn set_category(
        &self,
        id: &TaskId,
        category: Category,
        source: CategorySource,
    ) -> anyhow::Result<bool> {
        self.update(id, |task| {
            task.category = Some(category);
            task.category_source = Some(source);
        })
    }
}

#[tracing::instrument(skip(path))]
fn load_jsonl(path: &Path) -> anyhow::Result<Vec<Row>> {
    debug!(file = %path.display(), "loading jsonl");
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    let mut unreadable = 0usize;
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<Task>(line.trim()) {
            Ok(task) => out.push(Row::Task(task)),
            Err(err) => {
                warn!(
                    file = %path.display(),
                    line = idx + 1,
                    error = %err,
                    "skipping unreadable row"
                );
                unreadable += 1;
                out.push(Row::Unreadable(line));
            }
        }
    }

    debug!(count = out.len(), unreadable, "loaded rows from jsonl");
    Ok(out)
}

#[tracing::instrument(skip(path, rows))]
fn save_jsonl_atomic(path: &Path, rows: &[Row]) -> anyhow::Result<()> {
    debug!(file = %path.display(), count = rows.len(), "saving jsonl atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    for row in rows {
        match row {
            Row::Task(task) => writeln!(temp, "{}", serde_json::to_string(task)?)?,
            Row::Unreadable(raw) => writeln!(temp, "{raw}")?,
        }
    }
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
