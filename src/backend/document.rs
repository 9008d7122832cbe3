//! In-process document store backend.
//!
//! Records are stored as JSON documents in a single collection. The fields
//! the relational schema indexes get single-field ascending indexes here too;
//! a sort on one indexed field walks the index, every other sort scans the
//! collection. URLs have the form `memory://<name>`; every connect starts from
//! an empty collection.
//!
//! Every document lives in process memory, roughly 1 KiB per record with the
//! default secret length. Seeding the default base record count needs far
//! more RAM than most hosts have; size `base_record_count` accordingly.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use super::{BackendAdapter, BackendKind, ConnectOptions, Pool, RecordId, Session};
use crate::config::CaseConfig;
use crate::error::{BenchError, Result};
use crate::record::{epoch_millis, SyntheticRecord};
use crate::sort::{Direction, SortField, SortSpec};

const URL_PREFIX: &str = "memory://";

/// Fields carrying a single-field ascending index.
pub const INDEXED_FIELDS: [SortField; 7] = [
    SortField::CreatorId,
    SortField::OwnerId,
    SortField::RelatedToId,
    SortField::RelatedToType,
    SortField::LoggedAt,
    SortField::CreatedAt,
    SortField::UpdatedAt,
];

type Document = Map<String, Value>;

/// Comparable projection of a document field. Missing values sort first,
/// then numbers, then strings.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum IndexKey {
    Null,
    Int(i64),
    Str(String),
}

impl IndexKey {
    fn of(doc: &Document, field: SortField) -> Self {
        match doc.get(field.column()) {
            Some(Value::Number(n)) => n.as_i64().map_or(IndexKey::Null, IndexKey::Int),
            Some(Value::String(s)) => IndexKey::Str(s.clone()),
            _ => IndexKey::Null,
        }
    }
}

struct Collection {
    next_id: i64,
    docs: BTreeMap<RecordId, Document>,
    indexes: HashMap<SortField, BTreeSet<(IndexKey, RecordId)>>,
}

impl Collection {
    fn new() -> Self {
        let indexes = INDEXED_FIELDS
            .into_iter()
            .map(|field| (field, BTreeSet::new()))
            .collect();
        Self {
            next_id: 1,
            docs: BTreeMap::new(),
            indexes,
        }
    }

    fn insert(&mut self, doc: Document) {
        let id = RecordId(self.next_id);
        self.next_id += 1;
        for (field, index) in self.indexes.iter_mut() {
            index.insert((IndexKey::of(&doc, *field), id));
        }
        self.docs.insert(id, doc);
    }

    fn clear(&mut self) {
        self.docs.clear();
        for index in self.indexes.values_mut() {
            index.clear();
        }
    }

    /// Maximum under `(sort keys..., id ascending)`.
    fn last_by(&self, sort: &SortSpec) -> Option<RecordId> {
        if let [(field, direction)] = sort.keys() {
            if let Some(index) = self.indexes.get(field) {
                return last_in_index(index, *direction);
            }
        }
        self.docs
            .iter()
            .max_by(|(a_id, a), (b_id, b)| compare_docs(a, b, sort).then(a_id.cmp(b_id)))
            .map(|(id, _)| *id)
    }
}

fn last_in_index(index: &BTreeSet<(IndexKey, RecordId)>, direction: Direction) -> Option<RecordId> {
    match direction {
        Direction::Ascending => index.last().map(|(_, id)| *id),
        Direction::Descending => {
            let (lowest, _) = index.first()?;
            index
                .range((lowest.clone(), RecordId(i64::MIN))..=(lowest.clone(), RecordId(i64::MAX)))
                .next_back()
                .map(|(_, id)| *id)
        }
    }
}

fn compare_docs(a: &Document, b: &Document, sort: &SortSpec) -> Ordering {
    for &(field, direction) in sort.keys() {
        let ord = IndexKey::of(a, field).cmp(&IndexKey::of(b, field));
        let ord = match direction {
            Direction::Ascending => ord,
            Direction::Descending => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn to_document(record: &SyntheticRecord) -> Document {
    let value = json!({
        "url": record.url,
        "secret": record.secret,
        "creator_id": record.creator_id,
        "owner_id": record.owner_id,
        "related_to_id": record.related_to_id,
        "related_to_type": record.related_to_type.as_str(),
        "logged_at": epoch_millis(record.logged_at),
        "created_at": epoch_millis(record.created_at),
        "updated_at": epoch_millis(record.updated_at),
    });
    match value {
        Value::Object(doc) => doc,
        _ => unreachable!("json object literal"),
    }
}

/// Registry entry point.
pub fn connect(config: &CaseConfig, options: &ConnectOptions) -> Result<Box<dyn BackendAdapter>> {
    Ok(Box::new(DocumentBackend::open(&config.url, options.pool_size)?))
}

/// Pooled adapter over an in-process collection.
pub struct DocumentBackend {
    pool: Pool<DocumentSession>,
}

impl DocumentBackend {
    /// Creates an empty collection for `url` with a session pool of
    /// `pool_size`.
    pub fn open(url: &str, pool_size: usize) -> Result<Self> {
        let name = match url.strip_prefix(URL_PREFIX) {
            Some(name) if !name.is_empty() => name,
            _ => {
                return Err(BenchError::Connection(format!(
                    "unsupported document url '{url}' (expected {URL_PREFIX}<name>)"
                )))
            }
        };
        info!(collection = %name, pool_size, "document.connect");
        let collection = Arc::new(RwLock::new(Collection::new()));
        let pool = Pool::new("document", pool_size, move || {
            Ok(DocumentSession {
                collection: Arc::clone(&collection),
            })
        });
        Ok(Self { pool })
    }

}

impl BackendAdapter for DocumentBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Document
    }

    fn with_connection(&self, f: &mut dyn FnMut(&mut dyn Session) -> Result<()>) -> Result<()> {
        let mut session = self.pool.acquire()?;
        f(&mut *session)
    }

    fn disconnect(&self) -> Result<()> {
        self.pool.close();
        Ok(())
    }
}

/// Session handle onto the shared collection.
pub struct DocumentSession {
    collection: Arc<RwLock<Collection>>,
}

impl Session for DocumentSession {
    fn insert_batch(&mut self, records: &[SyntheticRecord]) -> Result<()> {
        let docs: Vec<Document> = records.iter().map(to_document).collect();
        let mut collection = self.collection.write();
        for doc in docs {
            collection.insert(doc);
        }
        debug!(inserted = records.len(), "document.insert_many");
        Ok(())
    }

    fn insert_one(&mut self, record: &SyntheticRecord) -> Result<()> {
        let doc = to_document(record);
        self.collection.write().insert(doc);
        Ok(())
    }

    fn find_last_by(&mut self, sort: &SortSpec) -> Result<Option<RecordId>> {
        Ok(self.collection.read().last_by(sort))
    }

    fn clear(&mut self) -> Result<()> {
        self.collection.write().clear();
        Ok(())
    }
}
