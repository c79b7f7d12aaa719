//! In-memory [`ListBackend`] implementation backed by [`DashMap`].
//!
//! Behaves like the REST service closely enough for development and tests:
//! ids are v4 UUIDs, items get sequential positions, soft deletes stamp
//! `deleted_at`. Every call is recorded so tests can assert what reached the
//! backend, and a one-shot failure can be armed to exercise error paths.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value as Json;
use uuid::Uuid;

use listgrid_core::{Column, ColumnUpdate, Item, ListSnapshot, Value, View, ViewConfig};

use crate::traits::ListBackend;

/// Lists keyed by list id, items keyed by item id.
#[derive(Default)]
pub struct MemoryBackend {
    lists: DashMap<String, ListSnapshot>,
    items: DashMap<String, Item>,
    calls: Mutex<Vec<&'static str>>,
    fail_next: AtomicBool,
}

impl MemoryBackend {
    /// Creates a new, empty `MemoryBackend`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a list. Replaces any list with the same id.
    pub fn insert_list(&self, list: ListSnapshot) {
        self.lists.insert(list.id.clone(), list);
    }

    /// Seeds an item as-is.
    pub fn insert_item(&self, item: Item) {
        self.items.insert(item.id.clone(), item);
    }

    /// Current stored copy of a view.
    #[must_use]
    pub fn view(&self, list_id: &str, view_id: &str) -> Option<View> {
        self.lists
            .get(list_id)
            .and_then(|list| list.view(view_id).cloned())
    }

    /// Current stored copy of an item.
    #[must_use]
    pub fn item(&self, item_id: &str) -> Option<Item> {
        self.items.get(item_id).map(|entry| entry.value().clone())
    }

    /// Names of the trait methods called so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Makes the next trait call fail with an error.
    pub fn fail_next_call(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    fn record(&self, method: &'static str) -> anyhow::Result<()> {
        self.calls.lock().push(method);
        if self.fail_next.swap(false, Ordering::SeqCst) {
            bail!("{method} failed");
        }
        Ok(())
    }

    fn item_in_list(&self, list_id: &str, item_id: &str) -> anyhow::Result<()> {
        match self.items.get(item_id) {
            Some(item) if item.list_id == list_id => Ok(()),
            _ => Err(anyhow!("item not found: {item_id}")),
        }
    }

    fn set_deleted(&self, list_id: &str, item_id: &str, deleted: bool) -> anyhow::Result<()> {
        self.item_in_list(list_id, item_id)?;
        let mut item = self
            .items
            .get_mut(item_id)
            .ok_or_else(|| anyhow!("item not found: {item_id}"))?;
        let now = Utc::now();
        item.deleted_at = deleted.then_some(now);
        item.updated_at = now;
        Ok(())
    }
}

#[async_trait]
impl ListBackend for MemoryBackend {
    async fn get_list(&self, list_id: &str) -> anyhow::Result<ListSnapshot> {
        self.record("get_list")?;
        let mut list = self
            .lists
            .get(list_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| anyhow!("list not found: {list_id}"))?;
        list.normalize();
        Ok(list)
    }

    async fn list_items(&self, list_id: &str, include_deleted: bool) -> anyhow::Result<Vec<Item>> {
        self.record("list_items")?;
        if !self.lists.contains_key(list_id) {
            bail!("list not found: {list_id}");
        }
        let mut items: Vec<Item> = self
            .items
            .iter()
            .filter(|entry| entry.list_id == list_id && (include_deleted || !entry.is_deleted()))
            .map(|entry| entry.value().clone())
            .collect();
        items.sort_by(|a, b| {
            a.position
                .cmp(&b.position)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        Ok(items)
    }

    async fn update_item_values(
        &self,
        list_id: &str,
        item_id: &str,
        values: &BTreeMap<String, Value>,
    ) -> anyhow::Result<Item> {
        self.record("update_item_values")?;
        self.item_in_list(list_id, item_id)?;
        let mut item = self
            .items
            .get_mut(item_id)
            .ok_or_else(|| anyhow!("item not found: {item_id}"))?;
        item.values
            .extend(values.iter().map(|(k, v)| (k.clone(), v.clone())));
        item.updated_at = Utc::now();
        Ok(item.clone())
    }

    async fn create_item(
        &self,
        list_id: &str,
        values: &BTreeMap<String, Value>,
    ) -> anyhow::Result<Item> {
        self.record("create_item")?;
        let known: Vec<String> = self
            .lists
            .get(list_id)
            .map(|list| list.columns.iter().map(|c| c.id.clone()).collect())
            .ok_or_else(|| anyhow!("list not found: {list_id}"))?;
        let position = self.items.iter().filter(|e| e.list_id == list_id).count();

        let mut item = Item::new(Uuid::new_v4().to_string(), list_id, Utc::now());
        item.position = Some(i64::try_from(position)?);
        item.values = values
            .iter()
            .filter(|(column_id, _)| known.contains(column_id))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        self.items.insert(item.id.clone(), item.clone());
        Ok(item)
    }

    async fn soft_delete_item(&self, list_id: &str, item_id: &str) -> anyhow::Result<()> {
        self.record("soft_delete_item")?;
        self.set_deleted(list_id, item_id, true)
    }

    async fn restore_item(&self, list_id: &str, item_id: &str) -> anyhow::Result<()> {
        self.record("restore_item")?;
        self.set_deleted(list_id, item_id, false)
    }

    async fn purge_item(&self, item_id: &str) -> anyhow::Result<()> {
        self.record("purge_item")?;
        self.items
            .remove(item_id)
            .map(|_| ())
            .ok_or_else(|| anyhow!("item not found: {item_id}"))
    }

    async fn update_view(
        &self,
        list_id: &str,
        view_id: &str,
        config: &ViewConfig,
    ) -> anyhow::Result<View> {
        self.record("update_view")?;
        let mut list = self
            .lists
            .get_mut(list_id)
            .ok_or_else(|| anyhow!("list not found: {list_id}"))?;
        let view = list
            .views
            .iter_mut()
            .find(|v| v.id == view_id)
            .ok_or_else(|| anyhow!("view not found: {view_id}"))?;
        view.config = config.clone();
        Ok(view.clone())
    }

    async fn create_view(
        &self,
        list_id: &str,
        name: &str,
        config: &ViewConfig,
    ) -> anyhow::Result<View> {
        self.record("create_view")?;
        let mut list = self
            .lists
            .get_mut(list_id)
            .ok_or_else(|| anyhow!("list not found: {list_id}"))?;
        let mut view = View::new(Uuid::new_v4().to_string(), list_id, name, false);
        view.position = Some(i64::try_from(list.views.len())?);
        view.config = config.clone();
        list.views.push(view.clone());
        Ok(view)
    }

    async fn delete_view(&self, list_id: &str, view_id: &str) -> anyhow::Result<()> {
        self.record("delete_view")?;
        let mut list = self
            .lists
            .get_mut(list_id)
            .ok_or_else(|| anyhow!("list not found: {list_id}"))?;
        let before = list.views.len();
        list.views.retain(|v| v.id != view_id);
        if list.views.len() == before {
            bail!("view not found: {view_id}");
        }
        Ok(())
    }

    async fn reorder_columns(
        &self,
        list_id: &str,
        column_ids: &[String],
    ) -> anyhow::Result<Vec<Column>> {
        self.record("reorder_columns")?;
        let mut list = self
            .lists
            .get_mut(list_id)
            .ok_or_else(|| anyhow!("list not found: {list_id}"))?;
        for column in &mut list.columns {
            if let Some(index) = column_ids.iter().position(|id| *id == column.id) {
                column.position = i64::try_from(index)?;
            }
        }
        list.normalize();
        Ok(list.columns.clone())
    }

    async fn update_column(
        &self,
        list_id: &str,
        column_id: &str,
        update: &ColumnUpdate,
    ) -> anyhow::Result<Column> {
        self.record("update_column")?;
        let mut list = self
            .lists
            .get_mut(list_id)
            .ok_or_else(|| anyhow!("list not found: {list_id}"))?;
        let column = list
            .columns
            .iter_mut()
            .find(|c| c.id == column_id)
            .ok_or_else(|| anyhow!("column not found: {column_id}"))?;

        // Patch the wire form so the config bag is re-split exactly as the
        // backend would return it.
        let mut wire = serde_json::to_value(&*column)?;
        if let Some(name) = &update.name {
            wire["name"] = Json::String(name.clone());
        }
        if let Some(column_type) = update.column_type {
            wire["column_type"] = serde_json::to_value(column_type)?;
        }
        if let Some(config) = &update.config {
            wire["config"] = Json::Object(config.clone());
        }
        *column = serde_json::from_value(wire)?;
        Ok(column.clone())
    }

    async fn delete_column(&self, list_id: &str, column_id: &str) -> anyhow::Result<()> {
        self.record("delete_column")?;
        {
            let mut list = self
                .lists
                .get_mut(list_id)
                .ok_or_else(|| anyhow!("list not found: {list_id}"))?;
            let before = list.columns.len();
            list.columns.retain(|c| c.id != column_id);
            if list.columns.len() == before {
                bail!("column not found: {column_id}");
            }
        }
        for mut item in self.items.iter_mut() {
            if item.list_id == list_id {
                item.values.remove(column_id);
            }
        }
        Ok(())
    }
}
