//! ironbean: an active-record ORM that derives SQLite schema from the records
//! you store.
//!
//! [`Database`] wires configuration, the connection pool, the schema cache,
//! the writer, reader and resolver, and the model event bus together. Models
//! are saved and deleted by publishing through the bus, so a [`Model`] never
//! holds a reference to the engine.

pub mod logging;

use std::collections::BTreeMap;
use std::sync::Arc;

pub use ib_core::config::Config;
pub use ib_core::events::{EventBus, EventKind, EventRecord};
pub use ib_core::{Element, Error, IdMode, Model, ModelState, RecordId, Related, Result, TypeTag, Value};
pub use ib_db::{Query, Resolved};

use ib_db::cache::SchemaCache;
use ib_db::pool::{get_conn, init_memory_pool_sized, init_pool, DbPool, PooledConnection};
use ib_db::reader::RecordReader;
use ib_db::resolver::RelationResolver;
use ib_db::tables::TableManager;
use ib_db::writer::RecordWriter;

/// One database instance and the engine bound to it.
pub struct Database {
    pool: DbPool,
    config: Config,
    cache: Arc<SchemaCache>,
    tables: Arc<TableManager>,
    writer: Arc<RecordWriter>,
    reader: Arc<RecordReader>,
    resolver: RelationResolver,
    events: EventBus,
}

impl Database {
    /// Open the database described by `config` and register the save and
    /// delete handlers on a fresh event bus.
    pub fn open(config: &Config) -> Result<Self> {
        for warning in config.validate() {
            tracing::warn!("config: {warning}");
        }

        let size = config.database.effective_pool_size();
        let pool = match config.database.file_path() {
            Some(path) => init_pool(&path.to_string_lossy(), size)?,
            None => init_memory_pool_sized(size)?,
        };

        let cache = Arc::new(SchemaCache::new());
        let tables = Arc::new(TableManager::new(
            Arc::clone(&cache),
            config.database.id_mode,
            config.database.frozen,
        ));
        let writer = Arc::new(RecordWriter::new(Arc::clone(&tables)));
        let reader = Arc::new(RecordReader::new(Arc::clone(&tables)));
        let resolver = RelationResolver::new(Arc::clone(&tables), Arc::clone(&reader));

        let events = EventBus::new();
        {
            let pool = pool.clone();
            let writer = Arc::clone(&writer);
            events.subscribe(EventKind::Save, move |event| {
                let conn = get_conn(&pool)?;
                writer.save(&*conn, event.model).map(|_| ())
            });
        }
        {
            let pool = pool.clone();
            let writer = Arc::clone(&writer);
            events.subscribe(EventKind::Delete, move |event| {
                let conn = get_conn(&pool)?;
                writer.trash(&*conn, event.model).map(|_| ())
            });
        }

        tracing::info!(
            id_mode = ?config.database.id_mode,
            frozen = config.database.frozen,
            in_memory = config.database.file_path().is_none(),
            "Database ready"
        );

        Ok(Self {
            pool,
            config: config.clone(),
            cache,
            tables,
            writer,
            reader,
            resolver,
            events,
        })
    }

    /// A private in-memory database with default settings.
    pub fn in_memory() -> Result<Self> {
        Self::open(&Config::default())
    }

    fn conn(&self) -> Result<PooledConnection> {
        get_conn(&self.pool)
    }

    // -- records ------------------------------------------------------------

    /// A new, unsaved model for `table`.
    pub fn dispense(&self, table: &str) -> Result<Model> {
        Model::new(table)
    }

    /// Save `model` with all of its pending relations. Returns its id.
    pub fn store(&self, model: &mut Model) -> Result<RecordId> {
        model.save(&self.events)
    }

    /// Delete `model`'s row. Related rows are left alone.
    pub fn trash(&self, model: &mut Model) -> Result<bool> {
        model.delete(&self.events)
    }

    pub fn load(&self, table: &str, id: &RecordId) -> Result<Option<Model>> {
        self.reader.load(&*self.conn()?, table, id)
    }

    pub fn load_all(&self, table: &str) -> Result<Vec<Model>> {
        self.reader.load_all(&*self.conn()?, table)
    }

    pub fn find(&self, query: &Query) -> Result<Vec<Model>> {
        self.reader.find(&*self.conn()?, query)
    }

    pub fn find_one(&self, query: &Query) -> Result<Option<Model>> {
        self.reader.find_one(&*self.conn()?, query)
    }

    pub fn count(&self, table: &str) -> Result<u64> {
        self.reader.count(&*self.conn()?, &Query::table(table))
    }

    /// Delete every row of `table`, keeping the table.
    pub fn wipe(&self, table: &str) -> Result<usize> {
        self.writer.wipe(&*self.conn()?, table)
    }

    // -- relations ----------------------------------------------------------

    /// Resolve `key` on `model`, loading related rows if needed.
    pub fn related(&self, model: &Model, key: &str) -> Result<Resolved> {
        self.resolver.resolve(&*self.conn()?, model, key)
    }

    /// Resolve `keys` now and cache the relations on `model`.
    pub fn with(&self, model: &mut Model, keys: &[&str]) -> Result<()> {
        self.resolver.with(&*self.conn()?, model, keys)
    }

    // -- schema -------------------------------------------------------------

    /// Stop issuing DDL. Saves that need a new column fail instead.
    pub fn freeze(&self) {
        self.tables.set_frozen(true);
    }

    pub fn unfreeze(&self) {
        self.tables.set_frozen(false);
    }

    pub fn is_frozen(&self) -> bool {
        self.tables.is_frozen()
    }

    pub fn tables(&self) -> Result<Vec<String>> {
        self.tables.tables(&*self.conn()?)
    }

    /// Live columns of `table` with their type tags.
    pub fn columns(&self, table: &str) -> Result<BTreeMap<String, Option<TypeTag>>> {
        self.tables.columns(&*self.conn()?, table)
    }

    /// Forget cached schema for `table`, or for every table.
    pub fn refresh_schema(&self, table: Option<&str>) {
        match table {
            Some(t) => self.cache.invalidate(t),
            None => self.cache.clear(),
        }
    }

    // -- accessors ----------------------------------------------------------

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn id_mode(&self) -> IdMode {
        self.tables.id_mode()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}
