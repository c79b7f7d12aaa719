use std::collections::BTreeMap;

use async_trait::async_trait;
use listgrid_core::{Column, ColumnUpdate, Item, ListSnapshot, Value, View, ViewConfig};

/// The list service a grid session reads from and writes to.
///
/// Implementations: HTTP (production), memory (development and tests).
/// Wire shapes are the implementation's concern; every method reports
/// transport and server failures through `anyhow::Error`.
#[async_trait]
pub trait ListBackend: Send + Sync {
    /// Load a list with its columns and views.
    async fn get_list(&self, list_id: &str) -> anyhow::Result<ListSnapshot>;

    /// Load a list's items, optionally including soft-deleted ones.
    async fn list_items(&self, list_id: &str, include_deleted: bool) -> anyhow::Result<Vec<Item>>;

    /// Merge `values` into an item's cells.
    async fn update_item_values(
        &self,
        list_id: &str,
        item_id: &str,
        values: &BTreeMap<String, Value>,
    ) -> anyhow::Result<Item>;

    /// Create an item at the end of the list.
    async fn create_item(
        &self,
        list_id: &str,
        values: &BTreeMap<String, Value>,
    ) -> anyhow::Result<Item>;

    /// Move an item to the recycle bin.
    async fn soft_delete_item(&self, list_id: &str, item_id: &str) -> anyhow::Result<()>;

    /// Bring an item back from the recycle bin.
    async fn restore_item(&self, list_id: &str, item_id: &str) -> anyhow::Result<()>;

    /// Remove an item permanently.
    async fn purge_item(&self, item_id: &str) -> anyhow::Result<()>;

    /// Replace a view's config.
    async fn update_view(
        &self,
        list_id: &str,
        view_id: &str,
        config: &ViewConfig,
    ) -> anyhow::Result<View>;

    /// Create a non-default grid view.
    async fn create_view(
        &self,
        list_id: &str,
        name: &str,
        config: &ViewConfig,
    ) -> anyhow::Result<View>;

    async fn delete_view(&self, list_id: &str, view_id: &str) -> anyhow::Result<()>;

    /// Persist a new column order. Returns the columns in that order.
    async fn reorder_columns(
        &self,
        list_id: &str,
        column_ids: &[String],
    ) -> anyhow::Result<Vec<Column>>;

    async fn update_column(
        &self,
        list_id: &str,
        column_id: &str,
        update: &ColumnUpdate,
    ) -> anyhow::Result<Column>;

    async fn delete_column(&self, list_id: &str, column_id: &str) -> anyhow::Result<()>;
}
