//! Cascading record writes.
//!
//! A save runs in tiers. Singular relations are saved first (each one a full
//! save of its own), then the owner's row, then every owned list, then every
//! shared list. Each tier is one transaction: a failure rolls back that tier
//! only and tiers committed before it stay committed.

use std::sync::Arc;

use ib_core::model::Pending;
use ib_core::naming::{foreign_key, junction, junction_columns};
use ib_core::{Error, IdMode, Model, RecordId, Result, Value};

use crate::conn::{in_transaction, SqlConnection};
use crate::ddl::quote_identifier;
use crate::schema::ForeignKey;
use crate::tables::TableManager;

pub struct RecordWriter {
    tables: Arc<TableManager>,
}

/// Put children of a failed tier back the way the caller left them.
fn reset(children: &mut [Model], pendings: Vec<Pending>) {
    for (child, pending) in children.iter_mut().zip(pendings) {
        child.restore_pending(pending);
        child.abort_save();
    }
}

impl RecordWriter {
    pub fn new(tables: Arc<TableManager>) -> Self {
        Self { tables }
    }

    /// Save `model` and everything assigned to it. Returns the model's id.
    ///
    /// On failure the model keeps its unsaved relations so the save can be
    /// retried; rows committed by earlier tiers are not undone.
    pub fn save(&self, conn: &dyn SqlConnection, model: &mut Model) -> Result<RecordId> {
        model.begin_save()?;
        let mut pending = model.take_pending();
        match self.save_with(conn, model, &mut pending) {
            Ok(id) => {
                model.finish_save();
                Ok(id)
            }
            Err(e) => {
                model.restore_pending(pending);
                model.abort_save();
                Err(e)
            }
        }
    }

    fn save_with(
        &self,
        conn: &dyn SqlConnection,
        model: &mut Model,
        pending: &mut Pending,
    ) -> Result<RecordId> {
        let foreign_keys = self.store_singulars(conn, model, pending)?;
        self.tables.ensure(conn, model, &foreign_keys)?;

        let id = in_transaction(conn, model.table(), |c| self.write_row(c, model))?;
        model.assign_id(id.clone());

        self.store_lists(conn, model, pending)?;
        Ok(id)
    }

    /// Save each pending singular relation and point `<table>_id` at it.
    fn store_singulars(
        &self,
        conn: &dyn SqlConnection,
        model: &mut Model,
        pending: &mut Pending,
    ) -> Result<Vec<ForeignKey>> {
        let mut foreign_keys = Vec::new();
        for related in pending.singular.values_mut() {
            let id = self.save(conn, related)?;
            let column = foreign_key(related.table());
            model.set(&column, id.to_value())?;
            foreign_keys.push(ForeignKey::to_id(column, related.table()));
        }
        Ok(foreign_keys)
    }

    /// Owned lists, then shared lists, for a model whose row is written.
    fn store_lists(
        &self,
        conn: &dyn SqlConnection,
        model: &Model,
        pending: &mut Pending,
    ) -> Result<()> {
        let owner_id = model
            .id()
            .cloned()
            .ok_or_else(|| Error::Internal(format!("`{}` has no id after write", model.table())))?;

        for (key, children) in pending.owned.iter_mut() {
            if !children.is_empty() {
                self.store_owned(conn, model.table(), &owner_id, key, children)?;
            }
        }
        for (key, children) in pending.shared.iter_mut() {
            if !children.is_empty() {
                self.store_shared(conn, model.table(), &owner_id, key, children)?;
            }
        }
        Ok(())
    }

    fn store_owned(
        &self,
        conn: &dyn SqlConnection,
        owner: &str,
        owner_id: &RecordId,
        key: &str,
        children: &mut [Model],
    ) -> Result<()> {
        let mut pendings = Vec::with_capacity(children.len());
        let result = self.try_store_owned(conn, owner, owner_id, key, children, &mut pendings);
        if result.is_err() {
            reset(children, pendings);
        }
        result
    }

    fn try_store_owned(
        &self,
        conn: &dyn SqlConnection,
        owner: &str,
        owner_id: &RecordId,
        key: &str,
        children: &mut [Model],
        pendings: &mut Vec<Pending>,
    ) -> Result<()> {
        let back_reference = foreign_key(owner);
        for child in children.iter_mut() {
            let mut foreign_keys = self.prepare(conn, child, pendings)?;
            child.set(&back_reference, owner_id.to_value())?;
            foreign_keys.push(ForeignKey::to_id(back_reference.clone(), owner));
            self.tables.ensure(conn, child, &foreign_keys)?;
        }

        let ids = in_transaction(conn, key, |c| {
            children
                .iter()
                .map(|child| self.write_row(c, child))
                .collect::<Result<Vec<_>>>()
        })?;
        tracing::debug!(owner, key, rows = ids.len(), "stored owned list");

        self.finish_children(conn, children, ids, pendings)
    }

    fn store_shared(
        &self,
        conn: &dyn SqlConnection,
        owner: &str,
        owner_id: &RecordId,
        key: &str,
        children: &mut [Model],
    ) -> Result<()> {
        let mut pendings = Vec::with_capacity(children.len());
        let result = self.try_store_shared(conn, owner, owner_id, key, children, &mut pendings);
        if result.is_err() {
            reset(children, pendings);
        }
        result
    }

    fn try_store_shared(
        &self,
        conn: &dyn SqlConnection,
        owner: &str,
        owner_id: &RecordId,
        key: &str,
        children: &mut [Model],
        pendings: &mut Vec<Pending>,
    ) -> Result<()> {
        let Some(foreign) = children.first().map(|c| c.table().to_string()) else {
            return Ok(());
        };
        for child in children.iter_mut() {
            let foreign_keys = self.prepare(conn, child, pendings)?;
            self.tables.ensure(conn, child, &foreign_keys)?;
        }

        let link_table = self.junction_table(conn, owner, &foreign)?;
        let (owner_column, foreign_column) = junction_columns(owner, &foreign);
        let placeholder = self.tables.id_mode().placeholder();
        let mut link = Model::new(&link_table)?;
        link.set(&owner_column, placeholder.clone())?;
        link.set(&foreign_column, placeholder)?;
        self.tables.ensure(
            conn,
            &link,
            &[
                ForeignKey::to_id(owner_column.clone(), owner),
                ForeignKey::to_id(foreign_column.clone(), foreign.as_str()),
            ],
        )?;

        let exists_sql = format!(
            "SELECT 1 FROM {} WHERE {} = ? AND {} = ? LIMIT 1",
            quote_identifier(&link_table),
            quote_identifier(&owner_column),
            quote_identifier(&foreign_column)
        );
        let ids = in_transaction(conn, key, |c| {
            let mut ids = Vec::with_capacity(children.len());
            for child in children.iter() {
                let id = self.write_row(c, child)?;
                let pair = [owner_id.to_value(), id.to_value()];
                if c.execute_query(&exists_sql, &pair)?.is_empty() {
                    let mut row = Model::new(&link_table)?;
                    row.set(&owner_column, owner_id.to_value())?;
                    row.set(&foreign_column, id.to_value())?;
                    self.write_row(c, &row)?;
                }
                ids.push(id);
            }
            Ok(ids)
        })?;
        tracing::debug!(owner, key, junction = %link_table, rows = ids.len(), "stored shared list");

        self.finish_children(conn, children, ids, pendings)
    }

    /// Enter the save of a list element and write its singular relations.
    fn prepare(
        &self,
        conn: &dyn SqlConnection,
        child: &mut Model,
        pendings: &mut Vec<Pending>,
    ) -> Result<Vec<ForeignKey>> {
        child.begin_save()?;
        pendings.push(child.take_pending());
        let pending = pendings
            .last_mut()
            .ok_or_else(|| Error::Internal("pending relations lost".into()))?;
        self.store_singulars(conn, child, pending)
    }

    /// Assign ids from a committed tier and cascade into each child's lists.
    fn finish_children(
        &self,
        conn: &dyn SqlConnection,
        children: &mut [Model],
        ids: Vec<RecordId>,
        pendings: &mut [Pending],
    ) -> Result<()> {
        for (child, id) in children.iter_mut().zip(ids) {
            child.assign_id(id);
        }
        for (child, pending) in children.iter_mut().zip(pendings.iter_mut()) {
            self.store_lists(conn, child, pending)?;
            *pending = Pending::default();
            child.finish_save();
        }
        Ok(())
    }

    /// The junction linking `owner` to `foreign`: whichever name order exists
    /// already, else `<owner>_<foreign>`.
    fn junction_table(&self, conn: &dyn SqlConnection, owner: &str, foreign: &str) -> Result<String> {
        let forward = junction(owner, foreign);
        if self.tables.table_exists(conn, &forward)? {
            return Ok(forward);
        }
        let reverse = junction(foreign, owner);
        if self.tables.table_exists(conn, &reverse)? {
            return Ok(reverse);
        }
        Ok(forward)
    }

    /// Insert or update the model's own columns. Runs inside the caller's
    /// transaction.
    pub fn write_row(&self, conn: &dyn SqlConnection, model: &Model) -> Result<RecordId> {
        let table = quote_identifier(model.table());
        let properties = model.properties();

        if let Some(id) = model.id() {
            if properties.is_empty() {
                return Ok(id.clone());
            }
            let assignments = properties
                .keys()
                .map(|k| format!("{} = ?", quote_identifier(k)))
                .collect::<Vec<_>>()
                .join(", ");
            let mut params: Vec<Value> = properties.values().cloned().collect();
            params.push(id.to_value());
            let changed = conn.execute_statement(
                &format!("UPDATE {table} SET {assignments} WHERE \"id\" = ?"),
                &params,
            )?;
            if changed == 0 {
                return Err(Error::RecordNotFound {
                    table: model.table().to_string(),
                    id: id.to_string(),
                });
            }
            return Ok(id.clone());
        }

        let mut columns: Vec<String> = properties.keys().map(|k| quote_identifier(k)).collect();
        let mut params: Vec<Value> = properties.values().cloned().collect();
        let generated = RecordId::generate(self.tables.id_mode());
        if let Some(ref id) = generated {
            columns.insert(0, quote_identifier("id"));
            params.insert(0, id.to_value());
        }

        if columns.is_empty() {
            conn.execute_statement(&format!("INSERT INTO {table} DEFAULT VALUES"), &[])?;
        } else {
            let placeholders = vec!["?"; columns.len()].join(", ");
            conn.execute_statement(
                &format!(
                    "INSERT INTO {table} ({}) VALUES ({placeholders})",
                    columns.join(", ")
                ),
                &params,
            )?;
        }

        Ok(match generated {
            Some(id) => id,
            None => RecordId::Int(conn.last_insert_id()),
        })
    }

    /// Delete the row behind `model`. Returns `false` when there was nothing
    /// to delete: the model was never saved or its table is gone.
    pub fn trash(&self, conn: &dyn SqlConnection, model: &mut Model) -> Result<bool> {
        let Some(id) = model.id().cloned() else {
            return Ok(false);
        };
        if !model.is_loaded() || !self.tables.table_exists(conn, model.table())? {
            return Ok(false);
        }
        let sql = format!("DELETE FROM {} WHERE \"id\" = ?", quote_identifier(model.table()));
        let removed = in_transaction(conn, model.table(), |c| {
            c.execute_statement(&sql, &[id.to_value()])
        })?;
        if removed > 0 {
            model.mark_deleted();
            tracing::debug!(table = model.table(), %id, "trashed");
        }
        Ok(removed > 0)
    }

    /// Delete every row of `table`. The table itself is kept.
    pub fn wipe(&self, conn: &dyn SqlConnection, table: &str) -> Result<usize> {
        if !self.tables.table_exists(conn, table)? {
            return Ok(0);
        }
        let sql = format!("DELETE FROM {}", quote_identifier(table));
        let removed = in_transaction(conn, table, |c| c.execute_statement(&sql, &[]))?;
        tracing::info!(table, rows = removed, "wiped table");
        Ok(removed)
    }

    pub fn id_mode(&self) -> IdMode {
        self.tables.id_mode()
    }
}
