use crate::*;

use sled::{
    transaction::{
        ConflictableTransactionError, ConflictableTransactionResult, TransactionError,
        Transactional,
    },
    Db, Tree,
};
use std::path::Path as FsPath;
use thiserror::Error;

mod index;
pub use index::*;

const RECORDS_TREE: &str = "todo";
const META_TREE: &str = "todo.meta";
const ID_COUNTER: &[u8] = b"id";
const EMPTY: &[u8] = &[];

/// Result alias for [`TodoStore`] operations
pub type StoreResult<T = ()> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    /// Lookup or scan matched no records
    #[error("not found")]
    NotFound,
    #[error("range bounds refer to different fields: {0:?} and {1:?}")]
    MismatchedRange(Field, Field),
    #[error("corrupted {0}")]
    Corrupted(&'static str),
    #[error(transparent)]
    Sled(#[from] sled::Error),
    #[error(transparent)]
    Codec(#[from] bincode::Error),
}

impl From<TransactionError<bincode::Error>> for StoreError {
    fn from(value: TransactionError<bincode::Error>) -> Self {
        match value {
            TransactionError::Abort(e) => StoreError::Codec(e),
            TransactionError::Storage(e) => StoreError::Sled(e),
        }
    }
}

/// The store operations request handlers rely on
pub trait TodoRepository: Send + Sync {
    /// Inserts `todo` and assigns its id if it has none, otherwise overwrites the stored record
    fn save(&self, todo: &mut Todo) -> StoreResult;
    fn one(&self, id: u64) -> StoreResult<Todo>;
    /// Not-done items first, each group newest first
    fn list(&self) -> StoreResult<Vec<Todo>>;
}

/// Sled-backed [`Todo`] collection with auto-increment ids and per-field indexes
///
/// Cloning is cheap and every clone shares the same underlying database.
#[derive(Clone, Debug)]
pub struct TodoStore {
    db: Db,
    records: Tree,
    meta: Tree,
    indexes: [Tree; 4],
}

impl TodoStore {
    pub fn open(path: impl AsRef<FsPath>) -> StoreResult<Self> {
        Self::from_db(sled::open(path)?)
    }

    /// In-memory store that is discarded on drop
    pub fn temporary() -> StoreResult<Self> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }

    fn from_db(db: Db) -> StoreResult<Self> {
        let records = db.open_tree(RECORDS_TREE)?;
        let meta = db.open_tree(META_TREE)?;
        let [done, title, created_at, updated_at] =
            Field::ALL.map(|field| db.open_tree(field.tree_name()));
        Ok(Self {
            indexes: [done?, title?, created_at?, updated_at?],
            db,
            records,
            meta,
        })
    }

    /// Records whose indexed field equals `value`, ordered by id
    pub fn find(&self, value: FieldValue) -> StoreResult<Vec<Todo>> {
        let entries = self.index(value.field()).scan_prefix(value.encode()).keys();
        self.load_entries(entries)
    }

    /// Records whose indexed field lies within `from..=to`
    ///
    /// Titles compare by length first, timestamps chronologically.
    pub fn between(&self, from: FieldValue, to: FieldValue) -> StoreResult<Vec<Todo>> {
        if from.field() != to.field() {
            return Err(StoreError::MismatchedRange(from.field(), to.field()));
        }
        let start = from.encode();
        let end = entry_key(&to, u64::MAX);
        let entries = self.index(from.field()).range(start..=end).keys();
        self.load_entries(entries)
    }

    pub fn count(&self) -> usize {
        self.records.len()
    }

    /// Writes dirty buffers to disk, returns the number of bytes flushed
    pub fn flush(&self) -> StoreResult<usize> {
        Ok(self.db.flush()?)
    }

    fn index(&self, field: Field) -> &Tree {
        &self.indexes[field as usize]
    }

    fn load_entries(
        &self,
        entries: impl Iterator<Item = sled::Result<sled::IVec>>,
    ) -> StoreResult<Vec<Todo>> {
        let todos = entries
            .map(|entry| -> StoreResult<Todo> {
                let id = id_from_entry(&entry?).ok_or(StoreError::Corrupted("index entry"))?;
                self.one(id)
            })
            .collect::<StoreResult<Vec<_>>>()?;
        match todos.is_empty() {
            true => Err(StoreError::NotFound),
            false => Ok(todos),
        }
    }

    fn next_id(&self) -> StoreResult<u64> {
        self.meta
            .update_and_fetch(ID_COUNTER, increment)?
            .as_deref()
            .and_then(decode_id)
            .ok_or(StoreError::Corrupted("id counter"))
    }

    fn write(&self, todo: &Todo) -> StoreResult {
        let key = todo.id.to_be_bytes();
        let record = bincode::serialize(todo)?;
        let entries: Vec<Vec<u8>> = field_values(todo)
            .iter()
            .map(|value| entry_key(value, todo.id))
            .collect();

        let [done, title, created_at, updated_at] = &self.indexes;
        (&self.records, done, title, created_at, updated_at).transaction(
            |(records, done, title, created_at, updated_at)| -> ConflictableTransactionResult<(), bincode::Error> {
                let indexes = [done, title, created_at, updated_at];
                if let Some(previous) = records.insert(&key[..], record.as_slice())? {
                    let previous: Todo = bincode::deserialize(&previous)
                        .map_err(ConflictableTransactionError::Abort)?;
                    for (index, value) in indexes.iter().zip(field_values(&previous).iter()) {
                        index.remove(entry_key(value, previous.id))?;
                    }
                }
                for (index, entry) in indexes.iter().zip(&entries) {
                    index.insert(entry.as_slice(), EMPTY)?;
                }
                Ok(())
            },
        )?;
        Ok(())
    }
}

impl TodoRepository for TodoStore {
    fn save(&self, todo: &mut Todo) -> StoreResult {
        let assigned = !todo.is_persisted();
        if assigned {
            todo.id = self.next_id()?;
        }
        let result = self.write(todo);
        if result.is_err() && assigned {
            todo.id = 0;
        }
        result
    }

    fn one(&self, id: u64) -> StoreResult<Todo> {
        let bytes = self.records.get(id.to_be_bytes())?.ok_or(StoreError::NotFound)?;
        Ok(bincode::deserialize(&bytes)?)
    }

    fn list(&self) -> StoreResult<Vec<Todo>> {
        let mut todos = self
            .records
            .iter()
            .values()
            .rev()
            .map(|bytes| -> StoreResult<Todo> { Ok(bincode::deserialize(&bytes?)?) })
            .collect::<StoreResult<Vec<_>>>()?;
        if todos.is_empty() {
            return Err(StoreError::NotFound);
        }
        // stable, so reverse insertion order survives within each group
        todos.sort_by_key(|todo| todo.done);
        Ok(todos)
    }
}

// an undecodable counter is left untouched so `next_id` reports it
fn increment(old: Option<&[u8]>) -> Option<Vec<u8>> {
    match old {
        None => Some(1u64.to_be_bytes().to_vec()),
        Some(bytes) => match decode_id(bytes) {
            Some(id) => Some((id + 1).to_be_bytes().to_vec()),
            None => Some(bytes.to_vec()),
        },
    }
}

fn decode_id(bytes: &[u8]) -> Option<u64> {
    bytes.try_into().ok().map(u64::from_be_bytes)
}
