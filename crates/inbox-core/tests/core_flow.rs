use std::fs;

use chrono::{Duration, TimeZone, Utc};
use inbox_core::auth::{AllowList, Authorized, Identity};
use inbox_core::datastore::{DataStore, FollowupTable};
use inbox_core::error::{InputError, MutationError};
use inbox_core::lifecycle::{Inbox, Outcome};
use inbox_core::task::{Category, CategorySource, Status, Task, TaskId};
use inbox_core::view::View;
use tempfile::tempdir;

fn signed_in() -> Authorized {
    AllowList::new(["owner@example.com"])
        .authorize(&Identity::from_email(Some("owner@example.com")))
        .expect("owner is allow-listed")
}

fn id(raw: &str) -> TaskId {
    TaskId::parse(raw).expect("valid id")
}

fn followup(raw_id: &str, category: Option<Category>, minutes: i64) -> Task {
    let base = Utc
        .with_ymd_and_hms(2026, 2, 16, 5, 0, 0)
        .single()
        .expect("valid timestamp");
    let mut task = Task::new_pending(
        id(raw_id),
        format!("{}@example.com", raw_id.to_lowercase()),
        base + Duration::minutes(minutes),
    );
    task.reason = format!("follow up with {raw_id}");
    task.ai_suggested_message = "Thanks for reaching out.".to_string();
    task.category = category;
    task.category_confidence = category.map(|_| 0.9);
    task.category_source = category.map(|_| CategorySource::Ai);
    task
}

#[test]
fn approve_is_idempotent() {
    let temp = tempdir().expect("tempdir");
    let store = DataStore::open(temp.path()).expect("open datastore");
    store
        .insert(vec![followup("A", Some(Category::Urgent), 0)])
        .expect("insert");

    let auth = signed_in();
    let mut inbox = Inbox::new(store);

    let first = inbox.approve(&auth, &id("A")).expect("first approve");
    assert_eq!(first, Outcome::Applied);

    let second = inbox.approve(&auth, &id("A")).expect("second approve");
    assert_eq!(second, Outcome::Unchanged);

    let stored = inbox.store().get(&id("A")).expect("get").expect("row exists");
    assert_eq!(stored.status, Status::Approved);
    assert!(inbox.pending().expect("pending").is_empty());
}

#[test]
fn closed_tasks_stay_closed() {
    let temp = tempdir().expect("tempdir");
    let store = DataStore::open(temp.path()).expect("open datastore");
    store
        .insert(vec![followup("A", None, 0)])
        .expect("insert");

    let auth = signed_in();
    let mut inbox = Inbox::new(store);

    assert_eq!(inbox.dismiss(&auth, &id("A")).expect("dismiss"), Outcome::Applied);
    assert_eq!(inbox.dismiss(&auth, &id("A")).expect("dismiss again"), Outcome::Unchanged);
    assert_eq!(inbox.approve(&auth, &id("A")).expect("approve"), Outcome::Unchanged);

    let stored = inbox.store().get(&id("A")).expect("get").expect("row exists");
    assert_eq!(stored.status, Status::Dismissed);
}

#[test]
fn unknown_id_is_a_zero_row_update() {
    let temp = tempdir().expect("tempdir");
    let store = DataStore::open(temp.path()).expect("open datastore");
    let auth = signed_in();
    let mut inbox = Inbox::new(store);

    assert_eq!(inbox.approve(&auth, &id("ghost")).expect("approve"), Outcome::NotFound);
    assert_eq!(
        inbox
            .recategorize(&auth, &id("ghost"), Category::Lead)
            .expect("recategorize"),
        Outcome::NotFound
    );
}

#[test]
fn invalid_category_leaves_row_untouched() {
    let temp = tempdir().expect("tempdir");
    let store = DataStore::open(temp.path()).expect("open datastore");
    store
        .insert(vec![followup("A", Some(Category::Invoice), 0)])
        .expect("insert");
    let before = fs::read_to_string(&store.data_path).expect("read data file");

    let auth = signed_in();
    let mut inbox = Inbox::new(store);

    let err = inbox
        .submit(&auth, "move", Some("A"), Some("newsletter"))
        .expect_err("unknown category must be rejected");
    assert!(matches!(
        err,
        MutationError::Input(InputError::UnknownCategory(ref raw)) if raw == "newsletter"
    ));

    let err = inbox
        .submit(&auth, "approve", None, None)
        .expect_err("missing id must be rejected");
    assert!(matches!(err, MutationError::Input(InputError::MissingId)));

    let after = fs::read_to_string(&inbox.store().data_path).expect("read data file");
    assert_eq!(before, after);
}

#[test]
fn recategorize_moves_tab_without_touching_status() {
    let temp = tempdir().expect("tempdir");
    let store = DataStore::open(temp.path()).expect("open datastore");
    let mut closed = followup("B", Some(Category::Lead), 1);
    closed.status = Status::Approved;
    store
        .insert(vec![followup("A", None, 0), closed])
        .expect("insert");

    let auth = signed_in();
    let mut inbox = Inbox::new(store);
    let view = View::default();

    assert_eq!(inbox.pending().expect("pending").len(), 1);
    assert_eq!(view.counts_by_tab(inbox.pending().expect("pending")).lead, 1);

    let outcome = inbox
        .submit(&auth, "move", Some("A"), Some("urgent"))
        .expect("move");
    assert_eq!(outcome, Outcome::Applied);

    let pending = inbox.pending().expect("pending");
    let counts = view.counts_by_tab(pending);
    assert_eq!(counts.urgent, 1);
    assert_eq!(counts.lead, 0);
    assert_eq!(pending[0].category_source, Some(CategorySource::Manual));
    assert!(pending[0].is_pending());

    assert_eq!(
        inbox
            .recategorize(&auth, &id("A"), Category::Urgent)
            .expect("same move"),
        Outcome::Unchanged
    );

    assert_eq!(
        inbox
            .recategorize(&auth, &id("B"), Category::Personal)
            .expect("move closed task"),
        Outcome::Applied
    );
    let b = inbox.store().get(&id("B")).expect("get").expect("row exists");
    assert_eq!(b.category, Some(Category::Personal));
    assert_eq!(b.status, Status::Approved);
}

#[test]
fn pending_snapshot_is_oldest_first_and_counted() {
    let temp = tempdir().expect("tempdir");
    let store = DataStore::open(temp.path()).expect("open datastore");
    let mut closed = followup("C", Some(Category::Urgent), 0);
    closed.status = Status::Approved;
    store
        .insert(vec![
            followup("B", Some(Category::Lead), 5),
            closed,
            followup("A", Some(Category::Urgent), 1),
        ])
        .expect("insert");

    let view = View::default();
    let pending = store.load_pending().expect("load pending");
    let ids: Vec<&str> = pending.iter().map(|task| task.id.as_str()).collect();
    assert_eq!(ids, vec!["A", "B"]);

    let counts = view.counts_by_tab(&pending);
    assert_eq!(counts.urgent, 1);
    assert_eq!(counts.lead, 1);
    assert_eq!(counts.invoice, 0);
    assert_eq!(counts.personal, 0);
    assert_eq!(view.total_pending(&pending), 2);
}

#[test]
fn insert_rejects_duplicate_ids() {
    let temp = tempdir().expect("tempdir");
    let store = DataStore::open(temp.path()).expect("open datastore");
    store
        .insert(vec![followup("A", None, 0)])
        .expect("insert");

    assert!(store.insert(vec![followup("A", None, 1)]).is_err());
    assert_eq!(store.load_all().expect("load").len(), 1);
}

/// Reads pass through to the real table; every write fails.
struct ReadOnlyTable(DataStore);

impl FollowupTable for ReadOnlyTable {
    fn load_pending(&self) -> anyhow::Result<Vec<Task>> {
        self.0.load_pending()
    }

    fn get(&self, id: &TaskId) -> anyhow::Result<Option<Task>> {
        self.0.get(id)
    }

    fn set_status(&self, _id: &TaskId, _status: Status) -> anyhow::Result<bool> {
        Err(anyhow::anyhow!("read-only file system"))
    }

    fn set_category(
        &self,
        _id: &TaskId,
        _category: Category,
        _source: CategorySource,
    ) -> anyhow::Result<bool> {
        Err(anyhow::anyhow!("read-only file system"))
    }
}

#[test]
fn failed_write_leaves_row_and_drops_snapshot() {
    let temp = tempdir().expect("tempdir");
    let store = DataStore::open(temp.path()).expect("open datastore");
    store
        .insert(vec![followup("A", Some(Category::Lead), 0)])
        .expect("insert");
    let before = fs::read_to_string(&store.data_path).expect("read data file");

    let auth = signed_in();
    let mut inbox = Inbox::new(ReadOnlyTable(store));
    assert_eq!(inbox.pending().expect("pending").len(), 1);

    inbox
        .store()
        .0
        .insert(vec![followup("B", None, 1)])
        .expect("insert behind the snapshot");
    assert_eq!(inbox.pending().expect("cached pending").len(), 1);

    let err = inbox
        .approve(&auth, &id("A"))
        .expect_err("write is refused");
    assert!(matches!(err, MutationError::Storage(_)));
    assert!(err.to_string().contains("read-only file system"));

    let err = inbox
        .recategorize(&auth, &id("A"), Category::Urgent)
        .expect_err("write is refused");
    assert!(matches!(err, MutationError::Storage(_)));

    assert_eq!(inbox.pending().expect("reloaded pending").len(), 2);
    let a = inbox.store().get(&id("A")).expect("get").expect("row exists");
    assert_eq!(a.status, Status::Pending);
    assert_eq!(a.category, Some(Category::Lead));

    let after = fs::read_to_string(&inbox.store().0.data_path).expect("read data file");
    assert!(after.starts_with(before.as_str()));
}

#[test]
fn unreadable_row_does_not_block_the_others() {
    let temp = tempdir().expect("tempdir");
    let store = DataStore::open(temp.path()).expect("open datastore");
    let good = serde_json::to_string(&followup("A", Some(Category::Urgent), 0)).expect("serialize");
    let bad = r#"{"id":"B","lead_email":"b@example.com","status":"pending","category":"newsletter","created_at":"2026-02-16T05:00:00Z"}"#;
    fs::write(&store.data_path, format!("{good}\n{bad}\n")).expect("seed data file");

    let auth = signed_in();
    let mut inbox = Inbox::new(store);
    let pending = inbox.pending().expect("pending");
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id.as_str(), "A");

    assert_eq!(inbox.approve(&auth, &id("A")).expect("approve"), Outcome::Applied);
    assert_eq!(inbox.approve(&auth, &id("B")).expect("approve"), Outcome::NotFound);

    let text = fs::read_to_string(&inbox.store().data_path).expect("read data file");
    assert_eq!(text.lines().nth(1), Some(bad));
    assert!(inbox.pending().expect("pending").is_empty());
}

#[test]
fn padded_ids_survive_a_rewrite() {
    let temp = tempdir().expect("tempdir");
    let store = DataStore::open(temp.path()).expect("open datastore");
    let padded = r#"{"id":" B ","lead_email":"b@example.com","status":"pending","created_at":"2026-02-16T05:00:00Z"}"#;
    let good = serde_json::to_string(&followup("A", None, 0)).expect("serialize");
    fs::write(&store.data_path, format!("{good}\n{padded}\n")).expect("seed data file");

    let auth = signed_in();
    let mut inbox = Inbox::new(store);
    assert_eq!(inbox.dismiss(&auth, &id("A")).expect("dismiss"), Outcome::Applied);

    let b = inbox
        .store()
        .load_all()
        .expect("load")
        .into_iter()
        .find(|task| task.id.as_str() == " B ")
        .expect("padded row kept");
    assert!(b.is_pending());
    let text = fs::read_to_string(&inbox.store().data_path).expect("read data file");
    assert!(text.contains(r#""id":" B ""#));
}
