//! Read-side relation resolution.
//!
//! Resolves a key on a model to a plain value, a single related model or a
//! collection, loading from storage when the relation was not assigned in
//! memory. `with` resolves eagerly and caches the result on the model.

use std::sync::Arc;

use ib_core::naming::{foreign_key, junction, junction_columns};
use ib_core::relation::list_key;
use ib_core::{Error, Model, RecordId, Related, RelationKind, Result, Value};

use crate::conn::SqlConnection;
use crate::ddl::quote_identifier;
use crate::query::Query;
use crate::reader::RecordReader;
use crate::tables::TableManager;

/// The outcome of resolving one key.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    Value(Value),
    One(Option<Model>),
    Many(Vec<Model>),
}

impl Resolved {
    /// The relation to cache on a model; plain values are not cached.
    pub fn into_related(self) -> Option<Related> {
        match self {
            Resolved::Value(_) => None,
            Resolved::One(m) => Some(Related::One(m.map(Box::new))),
            Resolved::Many(list) => Some(Related::Many(list)),
        }
    }
}

pub struct RelationResolver {
    tables: Arc<TableManager>,
    reader: Arc<RecordReader>,
}

impl RelationResolver {
    pub fn new(tables: Arc<TableManager>, reader: Arc<RecordReader>) -> Self {
        Self { tables, reader }
    }

    /// Resolve `key` on `model`.
    ///
    /// Lookup order: a plain property, a relation held in memory, a
    /// `<key>_id` reference, then the `own<Type>List` / `shared<Type>List`
    /// conventions. Anything else is [`Error::KeyNotFound`].
    pub fn resolve(&self, conn: &dyn SqlConnection, model: &Model, key: &str) -> Result<Resolved> {
        if let Ok(value) = model.get(key) {
            return Ok(Resolved::Value(value.clone()));
        }
        if let Some(one) = model.one(key) {
            return Ok(Resolved::One(Some(one.clone())));
        }
        if let Some(many) = model.many(key) {
            return Ok(Resolved::Many(many.to_vec()));
        }
        if let Some(related) = model.cached(key) {
            return Ok(match related {
                Related::One(m) => Resolved::One(m.as_deref().cloned()),
                Related::Many(list) => Resolved::Many(list.clone()),
            });
        }

        if let Ok(raw) = model.get(&format!("{key}_id")) {
            let table = key.to_lowercase();
            return match RecordId::from_value(raw) {
                Some(id) => Ok(Resolved::One(self.reader.load(conn, &table, &id)?)),
                None => Ok(Resolved::One(None)),
            };
        }

        match list_key(key) {
            Some(RelationKind::OwnedList(foreign)) => {
                Ok(Resolved::Many(self.owned(conn, model, &foreign)?))
            }
            Some(RelationKind::SharedList(foreign)) => {
                Ok(Resolved::Many(self.shared(conn, model, &foreign)?))
            }
            _ => Err(Error::key_not_found(model.table(), key)),
        }
    }

    /// Resolve each of `keys` and cache the relations on `model`.
    pub fn with(&self, conn: &dyn SqlConnection, model: &mut Model, keys: &[&str]) -> Result<()> {
        for key in keys {
            if let Some(related) = self.resolve(conn, model, key)?.into_related() {
                model.cache_related(key, related);
            }
        }
        Ok(())
    }

    /// Rows of `foreign` whose `<owner>_id` is the model's id.
    fn owned(&self, conn: &dyn SqlConnection, model: &Model, foreign: &str) -> Result<Vec<Model>> {
        let Some(id) = model.id() else {
            return Ok(Vec::new());
        };
        let back_reference = foreign_key(model.table());
        let has_column = self
            .tables
            .live(conn, foreign)?
            .is_some_and(|schema| schema.has_column(&back_reference));
        if !has_column {
            return Ok(Vec::new());
        }
        self.reader.find(
            conn,
            &Query::table(foreign)
                .eq(back_reference, id.to_value())
                .order_by("id", true),
        )
    }

    /// Rows of `foreign` linked to the model through either junction name.
    fn shared(&self, conn: &dyn SqlConnection, model: &Model, foreign: &str) -> Result<Vec<Model>> {
        let Some(id) = model.id() else {
            return Ok(Vec::new());
        };
        let owner = model.table();
        let (owner_column, foreign_column) = junction_columns(owner, foreign);

        let mut linked: Vec<Value> = Vec::new();
        let mut names = vec![junction(owner, foreign)];
        if owner != foreign {
            names.push(junction(foreign, owner));
        }
        for name in names {
            let Some(schema) = self.tables.live(conn, &name)? else {
                continue;
            };
            if !schema.has_column(&owner_column) || !schema.has_column(&foreign_column) {
                continue;
            }
            let sql = format!(
                "SELECT {} AS fid FROM {} WHERE {} = ?",
                quote_identifier(&foreign_column),
                quote_identifier(&name),
                quote_identifier(&owner_column)
            );
            for row in conn.execute_query(&sql, &[id.to_value()])? {
                if let Some(fid) = row.get("fid") {
                    if !linked.contains(fid) {
                        linked.push(fid.clone());
                    }
                }
            }
        }

        if linked.is_empty() {
            return Ok(Vec::new());
        }
        self.reader.find(
            conn,
            &Query::table(foreign).is_in("id", linked).order_by("id", true),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::SchemaCache;
    use crate::pool::init_memory_pool;
    use crate::writer::RecordWriter;
    use assert_matches::assert_matches;
    use ib_core::IdMode;

    struct Engine {
        writer: RecordWriter,
        reader: Arc<RecordReader>,
        resolver: RelationResolver,
    }

    fn engine() -> Engine {
        let tables = Arc::new(TableManager::new(
            Arc::new(SchemaCache::new()),
            IdMode::Integer,
            false,
        ));
        let reader = Arc::new(RecordReader::new(Arc::clone(&tables)));
        Engine {
            writer: RecordWriter::new(Arc::clone(&tables)),
            resolver: RelationResolver::new(tables, Arc::clone(&reader)),
            reader,
        }
    }

    fn named(table: &str, name: &str) -> Model {
        let mut m = Model::new(table).unwrap();
        m.set("name", name).unwrap();
        m
    }

    fn names(models: &[Model]) -> Vec<String> {
        models
            .iter()
            .map(|m| m.get("name").unwrap().as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn plain_and_unknown_keys() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let e = engine();

        let m = named("user", "Ann");
        assert_eq!(
            e.resolver.resolve(&*conn, &m, "name").unwrap(),
            Resolved::Value(Value::from("Ann"))
        );
        assert_matches!(
            e.resolver.resolve(&*conn, &m, "nonExistentKey"),
            Err(Error::KeyNotFound { .. })
        );
    }

    #[test]
    fn lazy_singular_by_foreign_key() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let e = engine();

        let mut parent = named("parent", "P");
        parent.set_model("user", named("user", "Ann")).unwrap();
        let id = e.writer.save(&*conn, &mut parent).unwrap();

        let loaded = e.reader.load(&*conn, "parent", &id).unwrap().unwrap();
        match e.resolver.resolve(&*conn, &loaded, "user").unwrap() {
            Resolved::One(Some(user)) => {
                assert_eq!(user.get("name").unwrap(), &Value::from("Ann"))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn owned_list_from_storage() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let e = engine();

        let mut parent = named("parent", "P");
        parent
            .set_list("ownChildList", vec![named("child", "a"), named("child", "b")])
            .unwrap();
        let id = e.writer.save(&*conn, &mut parent).unwrap();
        let mut other = named("parent", "Q");
        other.push("ownChildList", named("child", "c")).unwrap();
        e.writer.save(&*conn, &mut other).unwrap();

        let loaded = e.reader.load(&*conn, "parent", &id).unwrap().unwrap();
        match e.resolver.resolve(&*conn, &loaded, "ownChildList").unwrap() {
            Resolved::Many(children) => assert_eq!(names(&children), vec!["a", "b"]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn shared_list_probes_both_junction_names() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let e = engine();

        let mut tag = named("tag", "x");
        tag.push("sharedPostList", named("post", "p")).unwrap();
        e.writer.save(&*conn, &mut tag).unwrap();

        let post = e.reader.load(&*conn, "post", &RecordId::Int(1)).unwrap().unwrap();
        match e.resolver.resolve(&*conn, &post, "sharedTagList").unwrap() {
            Resolved::Many(tags) => assert_eq!(names(&tags), vec!["x"]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_storage_reads_empty() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let e = engine();

        let mut m = named("user", "Ann");
        e.writer.save(&*conn, &mut m).unwrap();
        assert_eq!(
            e.resolver.resolve(&*conn, &m, "ownBookList").unwrap(),
            Resolved::Many(Vec::new())
        );
        assert_eq!(
            e.resolver.resolve(&*conn, &m, "sharedTagList").unwrap(),
            Resolved::Many(Vec::new())
        );
    }

    #[test]
    fn with_caches_relations() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let e = engine();

        let mut parent = named("parent", "P");
        parent.push("ownChildList", named("child", "a")).unwrap();
        let id = e.writer.save(&*conn, &mut parent).unwrap();

        let mut loaded = e.reader.load(&*conn, "parent", &id).unwrap().unwrap();
        e.resolver
            .with(&*conn, &mut loaded, &["ownChildList", "name"])
            .unwrap();
        assert_eq!(loaded.many("ownChildList").unwrap().len(), 1);

        // Served from the cache once the rows are gone.
        conn.execute_batch("DELETE FROM child").unwrap();
        match e.resolver.resolve(&*conn, &loaded, "ownChildList").unwrap() {
            Resolved::Many(children) => assert_eq!(children.len(), 1),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(loaded.to_json()["ownChildList"][0]["name"], "a");
    }
}
