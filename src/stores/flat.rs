//! Implements a store that keeps each collection in a single JSON file.
//!
//! Every write rewrites the whole file: the collection is loaded, changed in
//! memory and saved back. Saves go through a temporary file in the same
//! directory that is then renamed over the old file, so a reader never sees a
//! partially written collection.
//!
//! The highest ID ever given out is kept next to each collection, e.g.
//! `<dir>/expenses.last_id`, so the ID of a deleted record is never handed
//! out again.
//!
//! The write lock only serializes writers within this process. Running
//! several processes against the same directory can lose writes.

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use tempfile::NamedTempFile;

use crate::{
    Error,
    record::{Entry, EntryKind, EntryPatch, Record, RecordId},
    stores::{Backend, RecordStore},
};

/// Stores records as JSON arrays, one file per collection, e.g.
/// `<dir>/expenses.json`.
#[derive(Debug, Clone)]
pub struct FlatStore {
    dir: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl FlatStore {
    /// Create a store that keeps its files in `dir`.
    ///
    /// The directory is not created. Writes fail until it exists.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// The file holding the collection for `kind`.
    pub fn path_for(&self, kind: EntryKind) -> PathBuf {
        self.dir.join(format!("{}.json", kind.collection()))
    }

    /// Load the whole collection for `E`.
    ///
    /// A missing or empty file is an empty collection.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::FlatStoreIo] if the file exists but cannot be read,
    /// - or [Error::FlatStoreFormat] if the file is not a JSON array of records.
    pub fn load<E: Entry>(&self) -> Result<Vec<Record<E>>, Error> {
        let path = self.path_for(E::KIND);

        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(io_error(&path, error)),
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        serde_json::from_slice(&bytes).map_err(|error| Error::FlatStoreFormat {
            path: path.display().to_string(),
            reason: error.to_string(),
        })
    }

    /// Replace the whole collection for `E` with `records`.
    ///
    /// # Errors
    /// Returns an [Error::FlatStoreIo] if the file cannot be written.
    pub fn save<E: Entry>(&self, records: &[Record<E>]) -> Result<(), Error> {
        self.write_atomically(&self.path_for(E::KIND), |file| {
            serde_json::to_writer_pretty(&mut *file, records)?;
            file.write_all(b"\n")
        })
    }

    /// The file holding the highest ID ever given out for `kind`.
    pub fn last_id_path_for(&self, kind: EntryKind) -> PathBuf {
        self.dir.join(format!("{}.last_id", kind.collection()))
    }

    /// The highest ID ever given out for `kind`, or 0 if none has been.
    fn load_last_id(&self, kind: EntryKind) -> Result<RecordId, Error> {
        let path = self.last_id_path_for(kind);

        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(error) => return Err(io_error(&path, error)),
        };

        text.trim().parse().map_err(|_| Error::FlatStoreFormat {
            path: path.display().to_string(),
            reason: format!("expected an ID, got {:?}", text.trim()),
        })
    }

    fn save_last_id(&self, kind: EntryKind, id: RecordId) -> Result<(), Error> {
        self.write_atomically(&self.last_id_path_for(kind), |file| writeln!(file, "{id}"))
    }

    /// Write a file through a temporary file in the same directory that is
    /// then renamed over `path`.
    fn write_atomically(
        &self,
        path: &Path,
        write: impl FnOnce(&mut NamedTempFile) -> io::Result<()>,
    ) -> Result<(), Error> {
        let mut file = NamedTempFile::new_in(&self.dir).map_err(|error| io_error(path, error))?;

        write(&mut file)
            .and_then(|_| file.as_file().sync_all())
            .map_err(|error| io_error(path, error))?;

        file.persist(path)
            .map_err(|error| io_error(path, error.error))?;

        Ok(())
    }

    /// Load the collection, let `change` modify it and save it back if
    /// `change` reports that it modified the collection.
    fn modify<E: Entry, T>(
        &self,
        change: impl FnOnce(&mut Vec<Record<E>>) -> Result<(T, bool), Error>,
    ) -> Result<T, Error> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| Error::FlatStoreLockError)?;

        let mut records = self.load::<E>()?;
        let (result, changed) = change(&mut records)?;

        if changed {
            self.save(&records)?;
        }

        Ok(result)
    }
}

impl<E: Entry> RecordStore<E> for FlatStore {
    fn backend(&self) -> Backend {
        Backend::Flat
    }

    fn list(&self) -> Result<Vec<Record<E>>, Error> {
        let mut records = self.load()?;
        records.sort_by_key(|record| record.id);

        Ok(records)
    }

    fn get(&self, id: RecordId) -> Result<Option<Record<E>>, Error> {
        Ok(self
            .load::<E>()?
            .into_iter()
            .find(|record| record.id == id))
    }

    fn create(&self, entry: E) -> Result<Record<E>, Error> {
        self.modify(|records: &mut Vec<Record<E>>| {
            let highest_id = records.iter().map(|record| record.id).max().unwrap_or(0);
            let id = self.load_last_id(E::KIND)?.max(highest_id) + 1;
            self.save_last_id(E::KIND, id)?;

            let record = Record { id, entry };
            records.push(record.clone());

            Ok((record, true))
        })
    }

    fn insert(&self, record: &Record<E>) -> Result<(), Error> {
        self.modify(|records: &mut Vec<Record<E>>| {
            if records.iter().any(|existing| existing.id == record.id) {
                return Err(Error::DuplicateId(record.id));
            }

            if record.id > self.load_last_id(E::KIND)? {
                self.save_last_id(E::KIND, record.id)?;
            }

            records.push(record.clone());

            Ok(((), true))
        })
    }

    fn update(&self, id: RecordId, patch: &EntryPatch) -> Result<Option<Record<E>>, Error> {
        self.modify(|records: &mut Vec<Record<E>>| {
            let Some(record) = records.iter_mut().find(|record| record.id == id) else {
                return Ok((None, false));
            };

            record.entry.apply(patch);

            Ok((Some(record.clone()), true))
        })
    }

    fn delete(&self, id: RecordId) -> Result<bool, Error> {
        self.modify(|records: &mut Vec<Record<E>>| {
            let initial_count = records.len();
            records.retain(|record| record.id != id);
            let deleted = records.len() < initial_count;

            Ok((deleted, deleted))
        })
    }

    fn bulk_delete(&self, ids: &[RecordId]) -> Result<usize, Error> {
        self.modify(|records: &mut Vec<Record<E>>| {
            let initial_count = records.len();
            records.retain(|record| !ids.contains(&record.id));
            let deleted_count = initial_count - records.len();

            Ok((deleted_count, deleted_count > 0))
        })
    }
}

fn io_error(path: &Path, error: io::Error) -> Error {
    Error::FlatStoreIo {
        path: path.display().to_string(),
        reason: error.to_string(),
    }
}

#[cfg(test)]
mod flat_store_tests {
    use std::fs;

    use time::macros::date;

    use crate::{
        Error,
        record::{EntryKind, EntryPatch, Expense, Income, Record, test_expense, test_income},
        stores::{FlatStore, RecordStore},
    };

    fn get_test_store() -> (tempfile::TempDir, FlatStore) {
        let dir = tempfile::tempdir().expect("could not create temp dir");
        let store = FlatStore::new(dir.path());
        (dir, store)
    }

    fn groceries() -> Expense {
        test_expense(date!(2025 - 01 - 01), "Groceries", "42.50")
    }

    #[test]
    fn load_returns_empty_when_file_is_missing() {
        let (_dir, store) = get_test_store();

        let records = store.load::<Expense>().unwrap();

        assert!(records.is_empty());
    }

    #[test]
    fn load_returns_empty_when_file_is_blank() {
        let (_dir, store) = get_test_store();
        fs::write(store.path_for(EntryKind::Expense), "\n").unwrap();

        let records = store.load::<Expense>().unwrap();

        assert!(records.is_empty());
    }

    #[test]
    fn load_fails_on_malformed_file() {
        let (_dir, store) = get_test_store();
        fs::write(store.path_for(EntryKind::Expense), "{not json").unwrap();

        let result = store.load::<Expense>();

        assert!(matches!(result, Err(Error::FlatStoreFormat { .. })));
    }

    #[test]
    fn save_then_load_returns_collection() {
        let (_dir, store) = get_test_store();
        let records = vec![
            Record {
                id: 1,
                entry: groceries(),
            },
            Record {
                id: 2,
                entry: test_expense(date!(2025 - 01 - 02), "Transport", "15"),
            },
        ];

        store.save(&records).unwrap();

        assert_eq!(store.load::<Expense>().unwrap(), records);
    }

    #[test]
    fn save_leaves_no_temporary_files() {
        let (dir, store) = get_test_store();

        store
            .save(&[Record {
                id: 1,
                entry: groceries(),
            }])
            .unwrap();

        let file_names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(file_names, vec!["expenses.json"]);
    }

    #[test]
    fn save_fails_when_directory_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FlatStore::new(dir.path().join("missing"));

        let result = store.save::<Expense>(&[]);

        assert!(matches!(result, Err(Error::FlatStoreIo { .. })));
    }

    #[test]
    fn collections_are_kept_in_separate_files() {
        let (_dir, store) = get_test_store();

        RecordStore::<Expense>::create(&store, groceries()).unwrap();
        RecordStore::<Income>::create(
            &store,
            test_income(date!(2025 - 01 - 01), "Salary", "8200"),
        )
        .unwrap();

        assert!(store.path_for(EntryKind::Expense).is_file());
        assert!(store.path_for(EntryKind::Income).is_file());
        assert_eq!(store.load::<Expense>().unwrap().len(), 1);
        assert_eq!(store.load::<Income>().unwrap().len(), 1);
    }

    #[test]
    fn create_assigns_next_id() {
        let (_dir, store) = get_test_store();
        store
            .save(&[Record {
                id: 41,
                entry: groceries(),
            }])
            .unwrap();

        let record = store.create(groceries()).unwrap();

        assert_eq!(record.id, 42);
        assert_eq!(record.entry, groceries());
    }

    #[test]
    fn create_does_not_reuse_id_of_deleted_record() {
        let (_dir, store) = get_test_store();
        store.create(groceries()).unwrap();
        let second = store.create(groceries()).unwrap();
        RecordStore::<Expense>::delete(&store, second.id).unwrap();

        let third = store.create(groceries()).unwrap();

        assert_eq!(third.id, second.id + 1);
        assert_eq!(
            fs::read_to_string(store.last_id_path_for(EntryKind::Expense)).unwrap(),
            format!("{}\n", third.id)
        );
    }

    #[test]
    fn create_skips_ids_given_to_inserted_records() {
        let (_dir, store) = get_test_store();
        store
            .insert(&Record {
                id: 10,
                entry: groceries(),
            })
            .unwrap();
        RecordStore::<Expense>::delete(&store, 10).unwrap();

        let record = store.create(groceries()).unwrap();

        assert_eq!(record.id, 11);
    }

    #[test]
    fn create_fails_on_malformed_last_id() {
        let (_dir, store) = get_test_store();
        fs::write(store.last_id_path_for(EntryKind::Expense), "eleven").unwrap();

        let result = store.create(groceries());

        assert!(matches!(result, Err(Error::FlatStoreFormat { .. })));
    }

    #[test]
    fn insert_keeps_given_id() {
        let (_dir, store) = get_test_store();
        let record = Record {
            id: 7,
            entry: groceries(),
        };

        store.insert(&record).unwrap();

        assert_eq!(RecordStore::<Expense>::get(&store, 7).unwrap(), Some(record));
    }

    #[test]
    fn insert_fails_on_duplicate_id() {
        let (_dir, store) = get_test_store();
        let created = store.create(groceries()).unwrap();

        let result = store.insert(&created);

        assert_eq!(result, Err(Error::DuplicateId(created.id)));
    }

    #[test]
    fn update_applies_patch() {
        let (_dir, store) = get_test_store();
        let created = store.create(groceries()).unwrap();
        let patch = EntryPatch {
            amount: Some("10".parse().unwrap()),
            ..Default::default()
        };

        let updated: Option<Record<Expense>> = store.update(created.id, &patch).unwrap();

        let updated = updated.expect("record should exist");
        assert_eq!(updated.entry.amount.to_string(), "10.00");
        assert_eq!(
            RecordStore::<Expense>::get(&store, created.id).unwrap(),
            Some(updated)
        );
    }

    #[test]
    fn update_returns_none_for_missing_id() {
        let (_dir, store) = get_test_store();

        let updated: Option<Record<Expense>> = store.update(999, &EntryPatch::default()).unwrap();

        assert_eq!(updated, None);
    }

    #[test]
    fn delete_reports_whether_record_existed() {
        let (_dir, store) = get_test_store();
        let created = store.create(groceries()).unwrap();

        assert!(RecordStore::<Expense>::delete(&store, created.id).unwrap());
        assert!(!RecordStore::<Expense>::delete(&store, created.id).unwrap());
    }

    #[test]
    fn bulk_delete_counts_only_existing_records() {
        let (_dir, store) = get_test_store();
        let first = store.create(groceries()).unwrap();
        let second = store.create(groceries()).unwrap();
        let third = store.create(groceries()).unwrap();

        let count =
            RecordStore::<Expense>::bulk_delete(&store, &[first.id, second.id, 999_999]).unwrap();

        assert_eq!(count, 2);
        assert_eq!(RecordStore::<Expense>::list(&store).unwrap(), vec![third]);
    }

    #[test]
    fn bulk_delete_without_matches_does_not_write() {
        let (_dir, store) = get_test_store();

        let count = RecordStore::<Expense>::bulk_delete(&store, &[1, 2]).unwrap();

        assert_eq!(count, 0);
        assert!(!store.path_for(EntryKind::Expense).exists());
    }
}
