mod common;

use common::{task_fields, todo_registry, Task};
use recordstore_core::{
    AsyncFetch, EngineError, EngineResult, FetchOptions, FetchRequest, FieldMap, RecordId,
    RecordStore, ResultRow, Schema, Scope, StorageEngine, StoreConfig, StoreError,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};

type Journal = Arc<Mutex<Vec<String>>>;

/// Scope that records every call and never touches storage.
struct JournalScope {
    name: String,
    parent: Option<Arc<JournalScope>>,
    pending: AtomicBool,
    fail_save: AtomicBool,
    marks_parent: AtomicBool,
    journal: Journal,
}

impl JournalScope {
    fn note(&self, event: &str) {
        self.journal
            .lock()
            .unwrap()
            .push(format!("{event}:{}", self.name));
    }

    fn fail_next_save(&self) {
        self.fail_save.store(true, Ordering::SeqCst);
    }

    /// Later saves leave the parent's pending flag alone.
    fn keep_parent_clean(&self) {
        self.marks_parent.store(false, Ordering::SeqCst);
    }

    fn entries(&self) -> Vec<String> {
        self.journal.lock().unwrap().clone()
    }
}

impl Scope for JournalScope {
    fn parent(&self) -> Option<Arc<Self>> {
        self.parent.clone()
    }

    fn has_pending_changes(&self) -> EngineResult<bool> {
        self.note("check");
        Ok(self.pending.load(Ordering::SeqCst))
    }

    fn save(&self) -> EngineResult<()> {
        self.note("save");
        if self.fail_save.swap(false, Ordering::SeqCst) {
            return Err(EngineError::InvalidData(format!("{} refused", self.name)));
        }
        self.pending.store(false, Ordering::SeqCst);
        if let Some(parent) = &self.parent {
            if self.marks_parent.load(Ordering::SeqCst) {
                parent.pending.store(true, Ordering::SeqCst);
            }
        }
        Ok(())
    }

    fn insert(&self, _entity: &str, _id: RecordId, _fields: FieldMap) -> EngineResult<()> {
        self.pending.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn update(&self, _entity: &str, _id: RecordId, _fields: FieldMap) -> EngineResult<()> {
        self.pending.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn delete(&self, _entity: &str, _id: RecordId) -> EngineResult<()> {
        self.pending.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn fetch(&self, _request: &FetchRequest) -> EngineResult<Vec<ResultRow>> {
        Ok(Vec::new())
    }

    fn fetch_async(&self, _request: &FetchRequest) -> EngineResult<AsyncFetch> {
        let (_, receiver) = mpsc::channel();
        Ok(AsyncFetch::from_receiver(receiver))
    }
}

struct JournalEngine {
    journal: Journal,
    next_scope: AtomicUsize,
    view: Arc<JournalScope>,
}

impl JournalEngine {
    fn scope(journal: &Journal, name: String, parent: Option<Arc<JournalScope>>) -> JournalScope {
        JournalScope {
            name,
            parent,
            pending: AtomicBool::new(false),
            fail_save: AtomicBool::new(false),
            marks_parent: AtomicBool::new(true),
            journal: Arc::clone(journal),
        }
    }
}

impl StorageEngine for JournalEngine {
    type Scope = JournalScope;

    fn open(_schema: Arc<Schema>, _config: &StoreConfig) -> EngineResult<Self> {
        let journal = Journal::default();
        let view = Arc::new(Self::scope(&journal, "view".to_string(), None));
        Ok(Self {
            journal,
            next_scope: AtomicUsize::new(1),
            view,
        })
    }

    fn view_scope(&self) -> Arc<JournalScope> {
        Arc::clone(&self.view)
    }

    fn new_scope(&self, parent: Option<&Arc<JournalScope>>) -> Arc<JournalScope> {
        let index = self.next_scope.fetch_add(1, Ordering::SeqCst);
        Arc::new(Self::scope(
            &self.journal,
            format!("s{index}"),
            parent.cloned(),
        ))
    }
}

fn open_journal_store() -> RecordStore<JournalEngine> {
    RecordStore::open("Todo", &todo_registry(), &StoreConfig::in_memory()).unwrap()
}

#[test]
fn cascade_walks_every_ancestor_in_parent_order() {
    let store = open_journal_store();
    let root = store.new_scope(None);
    let middle = store.new_scope(Some(&root));
    let leaf = store.new_scope(Some(&middle));

    let _: Task = store.new_record_in(&leaf, &task_fields("a", 1)).unwrap();
    store.save_changes(Some(&leaf)).unwrap();

    assert_eq!(
        leaf.entries(),
        vec!["check:s3", "save:s3", "check:s2", "save:s2", "check:s1", "save:s1"]
    );
}

#[test]
fn cascade_visits_ancestors_when_the_child_has_nothing_to_save() {
    let store = open_journal_store();
    let root = store.new_scope(None);
    let leaf = store.new_scope(Some(&root));

    let _: Task = store.new_record_in(&root, &task_fields("a", 1)).unwrap();
    store.save_changes(Some(&leaf)).unwrap();

    assert_eq!(leaf.entries(), vec!["check:s2", "check:s1", "save:s1"]);
}

#[test]
fn clean_middle_scope_is_checked_but_not_saved() {
    let store = open_journal_store();
    let root = store.new_scope(None);
    let middle = store.new_scope(Some(&root));
    let leaf = store.new_scope(Some(&middle));

    let _: Task = store.new_record_in(&root, &task_fields("a", 1)).unwrap();
    let _: Task = store.new_record_in(&leaf, &task_fields("b", 2)).unwrap();
    leaf.keep_parent_clean();
    store.save_changes(Some(&leaf)).unwrap();

    assert_eq!(
        leaf.entries(),
        vec!["check:s3", "save:s3", "check:s2", "check:s1", "save:s1"]
    );
}

#[test]
fn first_failing_save_halts_the_cascade() {
    let store = open_journal_store();
    let root = store.new_scope(None);
    let middle = store.new_scope(Some(&root));
    let leaf = store.new_scope(Some(&middle));

    let _: Task = store.new_record_in(&leaf, &task_fields("a", 1)).unwrap();
    middle.fail_next_save();

    assert!(matches!(
        store.save_changes(Some(&leaf)),
        Err(StoreError::Save(EngineError::InvalidData(message))) if message == "s2 refused"
    ));
    assert_eq!(
        leaf.entries(),
        vec!["check:s3", "save:s3", "check:s2", "save:s2"]
    );
}

#[test]
fn default_scope_is_the_view_scope() {
    let store = open_journal_store();
    let _: Task = store.new_record(&task_fields("a", 1)).unwrap();
    store.save_changes(None).unwrap();

    assert_eq!(store.view_scope().entries(), vec!["check:view", "save:view"]);
}

#[test]
fn missing_async_result_and_empty_count_are_fetch_errors() {
    let store = open_journal_store();
    let request = store
        .request::<RecordId>("Task", FetchOptions::default())
        .unwrap();

    assert!(matches!(
        store.execute(&request),
        Err(StoreError::Fetch(EngineError::NoFinalResult))
    ));
    assert!(matches!(
        store.count("Task", None, false),
        Err(StoreError::Fetch(EngineError::EmptyCountResult))
    ));
    assert!(store.fetch(&request).unwrap().is_empty());
}
