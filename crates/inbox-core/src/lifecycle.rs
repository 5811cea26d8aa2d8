use std::fmt;

use tracing::{debug, info, instrument, warn};

use crate::auth::Authorized;
use crate::datastore::{DataStore, FollowupTable};
use crate::error::{InputError, MutationError};
use crate::task::{Category, CategorySource, Status, Task, TaskId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    /// The task was already in the requested state; nothing was written.
    Unchanged,
    /// No row with that id; a zero-row update.
    NotFound,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Outcome::Applied => "applied",
            Outcome::Unchanged => "unchanged",
            Outcome::NotFound => "not found",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Approve(TaskId),
    Dismiss(TaskId),
    Recategorize(TaskId, Category),
}

impl Mutation {
    /// Builds a mutation from form-style fields. Nothing here touches the store.
    pub fn parse(
        action: &str,
        id: Option<&str>,
        category: Option<&str>,
    ) -> Result<Self, InputError> {
        let id = TaskId::parse(id.unwrap_or_default())?;
        match action.trim() {
            "approve" => Ok(Mutation::Approve(id)),
            "dismiss" => Ok(Mutation::Dismiss(id)),
            "move" | "recategorize" => {
                let raw = category.unwrap_or_default();
                Ok(Mutation::Recategorize(id, raw.parse()?))
            }
            other => Err(InputError::UnknownAction(other.to_string())),
        }
    }

    pub fn id(&self) -> &TaskId {
        match self {
            Mutation::Approve(id) | Mutation::Dismiss(id) | Mutation::Recategorize(id, _) => id,
        }
    }
}

/// Owns the status and category columns of the follow-up table, plus the
/// pending snapshot handed to the view layer.
#[derive(Debug)]
pub struct Inbox<T = DataStore> {
    store: T,
    snapshot: Option<Vec<Task>>,
}

impl<T: FollowupTable> Inbox<T> {
    pub fn new(store: T) -> Self {
        Self {
            store,
            snapshot: None,
        }
    }

    pub fn store(&self) -> &T {
        &self.store
    }

    /// Pending tasks oldest first, loaded once and reused until a write.
    pub fn pending(&mut self) -> anyhow::Result<&[Task]> {
        if self.snapshot.is_none() {
            let loaded = self.store.load_pending()?;
            debug!(count = loaded.len(), "refreshed pending snapshot");
            self.snapshot = Some(loaded);
        }
        Ok(self.snapshot.as_deref().unwrap_or_default())
    }

    pub fn invalidate(&mut self) {
        self.snapshot = None;
    }

    #[instrument(skip(self, auth), fields(user = %auth.email()))]
    pub fn approve(&mut self, auth: &Authorized, id: &TaskId) -> Result<Outcome, MutationError> {
        self.transition(id, Status::Approved)
    }

    #[instrument(skip(self, auth), fields(user = %auth.email()))]
    pub fn dismiss(&mut self, auth: &Authorized, id: &TaskId) -> Result<Outcome, MutationError> {
        self.transition(id, Status::Dismissed)
    }

    /// Moves a task to another tab. Allowed whatever the status.
    #[instrument(skip(self, auth), fields(user = %auth.email()))]
    pub fn recategorize(
        &mut self,
        auth: &Authorized,
        id: &TaskId,
        category: Category,
    ) -> Result<Outcome, MutationError> {
        let Some(task) = self.store.get(id).map_err(MutationError::Storage)? else {
            debug!("recategorize on unknown id");
            return Ok(Outcome::NotFound);
        };

        if task.category == Some(category) && task.category_source == Some(CategorySource::Manual)
        {
            debug!("category already set manually");
            return Ok(Outcome::Unchanged);
        }
        if !task.is_pending() {
            debug!(status = %task.status, "recategorizing a closed task");
        }

        let written = self.store.set_category(id, category, CategorySource::Manual);
        self.invalidate();
        match written.map_err(MutationError::Storage)? {
            true => {
                info!(from = ?task.category, to = %category, "task recategorized");
                Ok(Outcome::Applied)
            }
            false => Ok(Outcome::NotFound),
        }
    }

    pub fn apply(&mut self, auth: &Authorized, mutation: &Mutation) -> Result<Outcome, MutationError> {
        match mutation {
            Mutation::Approve(id) => self.approve(auth, id),
            Mutation::Dismiss(id) => self.dismiss(auth, id),
            Mutation::Recategorize(id, category) => self.recategorize(auth, id, *category),
        }
    }

    /// Parses raw request fields and applies the result. Malformed input is
    /// rejected before the store is read or written.
    #[instrument(skip(self, auth), fields(user = %auth.email()))]
    pub fn submit(
        &mut self,
        auth: &Authorized,
        action: &str,
        id: Option<&str>,
        category: Option<&str>,
    ) -> Result<Outcome, MutationError> {
        let mutation = Mutation::parse(action, id, category).inspect_err(|err| {
            warn!(error = %err, "rejected mutation request");
        })?;
        debug!(id = %mutation.id(), "parsed mutation request");
        self.apply(auth, &mutation)
    }

    fn transition(&mut self, id: &TaskId, target: Status) -> Result<Outcome, MutationError> {
        let Some(task) = self.store.get(id).map_err(MutationError::Storage)? else {
            debug!(wanted = %target, "transition on unknown id");
            return Ok(Outcome::NotFound);
        };

        if !task.is_pending() {
            debug!(current = %task.status, wanted = %target, "task already closed");
            return Ok(Outcome::Unchanged);
        }

        let written = self.store.set_status(id, target);
        self.invalidate();
        match written.map_err(MutationError::Storage)? {
            true => {
                info!(status = %target, "task closed");
                Ok(Outcome::Applied)
            }
            false => Ok(Outcome::NotFound),
        }
    }
}
