//! The mutable record abstraction.
//!
//! A [`Model`] is a table name, an optional id, a bag of plain properties and
//! the related models assigned to it but not yet persisted. Every assignment
//! goes through [`classify`] so the kind of each key is decided once.

use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;
use std::mem;

use crate::error::{Error, Result};
use crate::events::{EventBus, EventKind};
use crate::ids::RecordId;
use crate::naming::{check_identifier, check_table};
use crate::relation::{classify, RelationKind, Shape};
use crate::types::TypeTag;
use crate::value::Value;

/// Lifecycle of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelState {
    /// Constructed in memory, never saved.
    New,
    /// Inside a save cascade.
    Saving,
    /// Backed by a stored row.
    Loaded,
    /// Its row was deleted.
    Deleted,
}

/// One element of a list assignment.
#[derive(Debug, Clone)]
pub enum Element {
    Model(Model),
    Value(Value),
}

impl From<Model> for Element {
    fn from(model: Model) -> Self {
        Element::Model(model)
    }
}

impl From<Value> for Element {
    fn from(value: Value) -> Self {
        Element::Value(value)
    }
}

/// Related data resolved from storage and cached on the model.
#[derive(Debug, Clone, PartialEq)]
pub enum Related {
    One(Option<Box<Model>>),
    Many(Vec<Model>),
}

impl Related {
    fn to_json(&self) -> JsonValue {
        match self {
            Related::One(Some(m)) => m.to_json(),
            Related::One(None) => JsonValue::Null,
            Related::Many(list) => JsonValue::Array(list.iter().map(Model::to_json).collect()),
        }
    }
}

/// Related models assigned but not yet written.
#[derive(Debug, Clone, Default)]
pub struct Pending {
    pub singular: BTreeMap<String, Model>,
    pub owned: BTreeMap<String, Vec<Model>>,
    pub shared: BTreeMap<String, Vec<Model>>,
}

impl Pending {
    pub fn is_empty(&self) -> bool {
        self.singular.is_empty() && self.owned.is_empty() && self.shared.is_empty()
    }

    fn remove(&mut self, key: &str) {
        self.singular.remove(key);
        self.owned.remove(key);
        self.shared.remove(key);
    }
}

/// A record bound to a table.
#[derive(Debug, Clone)]
pub struct Model {
    table: String,
    id: Option<RecordId>,
    properties: BTreeMap<String, Value>,
    kinds: BTreeMap<String, RelationKind>,
    pending: Pending,
    cache: BTreeMap<String, Related>,
    state: ModelState,
    id_tampered: bool,
}

impl Model {
    /// Create a new, unsaved model for `table`.
    pub fn new(table: &str) -> Result<Self> {
        check_table(table)?;
        Ok(Self {
            table: table.to_string(),
            id: None,
            properties: BTreeMap::new(),
            kinds: BTreeMap::new(),
            pending: Pending::default(),
            cache: BTreeMap::new(),
            state: ModelState::New,
            id_tampered: false,
        })
    }

    /// Rebuild a loaded model from a stored row.
    pub fn from_row(table: &str, id: RecordId, properties: BTreeMap<String, Value>) -> Self {
        Self {
            table: table.to_string(),
            id: Some(id),
            properties,
            kinds: BTreeMap::new(),
            pending: Pending::default(),
            cache: BTreeMap::new(),
            state: ModelState::Loaded,
            id_tampered: false,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn id(&self) -> Option<&RecordId> {
        self.id.as_ref()
    }

    pub fn state(&self) -> ModelState {
        self.state
    }

    /// Whether this model came from storage (or has been saved).
    pub fn is_loaded(&self) -> bool {
        self.state == ModelState::Loaded
    }

    /// Whether the id was assigned directly.
    pub fn id_tampered(&self) -> bool {
        self.id_tampered
    }

    // -- assignment ---------------------------------------------------------

    /// Assign a value to `key`.
    ///
    /// Assigning `id` never changes the id; it marks the model so the next
    /// save fails with [`Error::IdTamper`]. A non-empty array under an
    /// `own*List`/`shared*List` key fails with [`Error::InvalidModelList`].
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Result<()> {
        check_identifier(key)?;
        let value = value.into();
        if is_id_key(key) {
            if self.id.is_none() || self.id.as_ref().map(RecordId::to_value) != Some(value) {
                self.id_tampered = true;
            }
            return Ok(());
        }

        match classify(key, &Shape::of_value(&value))? {
            RelationKind::Plain => {
                let column = self.column_key(key);
                self.forget(key);
                self.properties.insert(column, value);
            }
            kind @ RelationKind::OwnedList(_) => {
                self.forget(key);
                self.pending.owned.insert(key.to_string(), Vec::new());
                self.kinds.insert(key.to_string(), kind);
            }
            kind @ RelationKind::SharedList(_) => {
                self.forget(key);
                self.pending.shared.insert(key.to_string(), Vec::new());
                self.kinds.insert(key.to_string(), kind);
            }
            RelationKind::Singular(_) => {
                return Err(Error::Internal(format!(
                    "plain value for `{key}` classified as a model"
                )))
            }
        }
        Ok(())
    }

    /// Assign a single related model to `key`.
    pub fn set_model(&mut self, key: &str, model: Model) -> Result<()> {
        check_identifier(key)?;
        let kind = classify(key, &Shape::Model(model.table()))?;
        self.forget(key);
        self.pending.singular.insert(key.to_string(), model);
        self.kinds.insert(key.to_string(), kind);
        Ok(())
    }

    /// Assign a list to `key`.
    ///
    /// Lists of models must use an `own<Type>List` or `shared<Type>List` key;
    /// lists of plain values under other keys are stored as JSON.
    pub fn set_list<I, T>(&mut self, key: &str, items: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: Into<Element>,
    {
        check_identifier(key)?;
        let items: Vec<Element> = items.into_iter().map(Into::into).collect();
        let tables: Vec<&str> = items
            .iter()
            .filter_map(|e| match e {
                Element::Model(m) => Some(m.table()),
                Element::Value(_) => None,
            })
            .collect();
        let others = items.len() - tables.len();
        let kind = classify(key, &Shape::List { tables, others })?;
        if is_id_key(key) && kind == RelationKind::Plain {
            self.id_tampered = true;
            return Ok(());
        }

        let mut models = Vec::new();
        let mut values = Vec::new();
        for element in items {
            match element {
                Element::Model(m) => models.push(m),
                Element::Value(v) => values.push(v),
            }
        }
        let column = self.column_key(key);
        self.forget(key);
        match &kind {
            RelationKind::Plain => {
                self.properties.insert(column, Value::from(values));
                return Ok(());
            }
            RelationKind::OwnedList(_) => {
                self.pending.owned.insert(key.to_string(), models);
            }
            RelationKind::SharedList(_) => {
                self.pending.shared.insert(key.to_string(), models);
            }
            RelationKind::Singular(_) => {
                return Err(Error::Internal(format!("list for `{key}` classified as a model")))
            }
        }
        self.kinds.insert(key.to_string(), kind);
        Ok(())
    }

    /// Append one model to an `own*List`/`shared*List` key, keeping any
    /// models already pending under it.
    pub fn push(&mut self, key: &str, model: Model) -> Result<()> {
        check_identifier(key)?;
        let kind = classify(
            key,
            &Shape::List {
                tables: vec![model.table()],
                others: 0,
            },
        )?;
        match &kind {
            RelationKind::OwnedList(_) => {
                self.properties.remove(key);
                self.pending.owned.entry(key.to_string()).or_default().push(model);
            }
            RelationKind::SharedList(_) => {
                self.properties.remove(key);
                self.pending.shared.entry(key.to_string()).or_default().push(model);
            }
            other => {
                return Err(Error::InvalidRelationType(format!(
                    "cannot append to `{key}` ({other})"
                )))
            }
        }
        self.kinds.insert(key.to_string(), kind);
        Ok(())
    }

    /// Remove `key` from the model entirely.
    pub fn unset(&mut self, key: &str) {
        self.forget(key);
        self.cache.remove(key);
    }

    /// The spelling under which `key` is already stored. Column names are
    /// case-insensitive, so `Name` overwrites an existing `name`.
    fn column_key(&self, key: &str) -> String {
        self.properties
            .keys()
            .find(|k| k.eq_ignore_ascii_case(key))
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }

    fn forget(&mut self, key: &str) {
        self.properties.remove(key);
        self.pending.remove(key);
        self.kinds.remove(key);
    }

    // -- access -------------------------------------------------------------

    /// Plain property `key`.
    pub fn get(&self, key: &str) -> Result<&Value> {
        self.properties
            .get(key)
            .or_else(|| self.properties.get(&self.column_key(key)))
            .ok_or_else(|| Error::key_not_found(&self.table, key))
    }

    /// Whether `key` holds a plain value, a pending relation or a cached one.
    pub fn isset(&self, key: &str) -> bool {
        self.properties.contains_key(key) || self.kinds.contains_key(key) || self.cache.contains_key(key)
    }

    /// The related model under `key`, pending or cached.
    pub fn one(&self, key: &str) -> Option<&Model> {
        match self.pending.singular.get(key) {
            Some(m) => Some(m),
            None => match self.cache.get(key) {
                Some(Related::One(Some(m))) => Some(m.as_ref()),
                _ => None,
            },
        }
    }

    /// The related models under `key`, pending or cached.
    pub fn many(&self, key: &str) -> Option<&[Model]> {
        if let Some(list) = self.pending.owned.get(key).or_else(|| self.pending.shared.get(key)) {
            return Some(list.as_slice());
        }
        match self.cache.get(key) {
            Some(Related::Many(list)) => Some(list.as_slice()),
            _ => None,
        }
    }

    /// How `key` was classified when it was assigned.
    pub fn relation_kind(&self, key: &str) -> Option<&RelationKind> {
        self.kinds.get(key)
    }

    /// The model's own, non-relational properties.
    pub fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }

    /// Inferred type tag for each own property; nulls default to text.
    pub fn types(&self) -> BTreeMap<String, TypeTag> {
        self.properties
            .iter()
            .map(|(k, v)| (k.clone(), TypeTag::infer_or(v, None)))
            .collect()
    }

    // -- cascade support ------------------------------------------------------

    /// Related models awaiting a save.
    pub fn pending(&self) -> &Pending {
        &self.pending
    }

    /// Move the pending relations out of the model.
    pub fn take_pending(&mut self) -> Pending {
        mem::take(&mut self.pending)
    }

    /// Put back relations taken with [`Model::take_pending`] after a failed save.
    pub fn restore_pending(&mut self, pending: Pending) {
        self.pending = pending;
    }

    /// Enter the saving state, refusing deleted models and models whose id
    /// was tampered with.
    pub fn begin_save(&mut self) -> Result<()> {
        if self.state == ModelState::Deleted {
            return Err(Error::RecordNotFound {
                table: self.table.clone(),
                id: self.id.as_ref().map(ToString::to_string).unwrap_or_default(),
            });
        }
        if self.id_tampered {
            return Err(Error::IdTamper {
                table: self.table.clone(),
            });
        }
        self.state = ModelState::Saving;
        Ok(())
    }

    /// Record the id assigned by a write without finishing the save.
    pub fn assign_id(&mut self, id: RecordId) {
        self.id = Some(id);
    }

    /// Finish a save: the model is loaded and its relation buffers are empty.
    pub fn finish_save(&mut self) {
        self.pending = Pending::default();
        self.kinds.clear();
        self.state = ModelState::Loaded;
    }

    /// Leave the saving state after a failure.
    pub fn abort_save(&mut self) {
        self.state = if self.id.is_some() {
            ModelState::Loaded
        } else {
            ModelState::New
        };
    }

    pub fn mark_deleted(&mut self) {
        self.state = ModelState::Deleted;
    }

    /// Cache related data resolved for `key`.
    pub fn cache_related(&mut self, key: &str, related: Related) {
        self.cache.insert(key.to_string(), related);
    }

    pub fn cached(&self, key: &str) -> Option<&Related> {
        self.cache.get(key)
    }

    // -- events -------------------------------------------------------------

    /// Publish a save for this model and return its id.
    pub fn save(&mut self, bus: &EventBus) -> Result<RecordId> {
        bus.publish(EventKind::Save, self)?;
        self.id
            .clone()
            .ok_or_else(|| Error::Internal(format!("no save handler stored `{}`", self.table)))
    }

    /// Publish a delete for this model. Returns whether it is now deleted.
    pub fn delete(&mut self, bus: &EventBus) -> Result<bool> {
        bus.publish(EventKind::Delete, self)?;
        Ok(self.state == ModelState::Deleted)
    }

    // -- export -------------------------------------------------------------

    /// Export id, plain properties and cached relations as JSON.
    pub fn to_json(&self) -> JsonValue {
        let mut map = Map::new();
        map.insert(
            "id".into(),
            self.id.as_ref().map_or(JsonValue::Null, |id| id.to_value().to_json()),
        );
        for (k, v) in &self.properties {
            map.insert(k.clone(), v.to_json());
        }
        for (k, r) in &self.cache {
            map.insert(k.clone(), r.to_json());
        }
        JsonValue::Object(map)
    }
}

/// Equal when ids match and the plain property sets are identical.
impl PartialEq for Model {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.properties == other.properties
    }
}

/// `id` in any letter case names the primary key column.
pub fn is_id_key(key: &str) -> bool {
    key.eq_ignore_ascii_case("id")
}
