//! One user's grid over one list.
//!
//! [`GridSession`] owns the canonical row set plus the filter, search and sort
//! state, and exposes the handlers a grid UI calls. Local state changes first
//! and synchronously; backend writes follow and are reconciled by refetching.
//! A failed write is reported to the caller and the observer, and the
//! optimistic local change stays in place.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use listgrid_core::{
    filter_options, parse_cell_input, toggle_filter, Column, ColumnType, ColumnUpdate,
    FilterState, GridSettings, ListSnapshot, Row, RowPresentation, RowState, SortDirection,
    SortState, Value, View,
};

use crate::error::SessionError;
use crate::observer::SessionObserver;
use crate::traits::ListBackend;
use crate::views::ViewPersistence;

/// What a grid renders its header indicators and filter panel from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GridState {
    pub sort_column: Option<String>,
    pub sort_direction: Option<SortDirection>,
    pub active_filters: FilterState,
    pub active_view_id: Option<String>,
    pub search: String,
}

pub struct GridSession {
    backend: Arc<dyn ListBackend>,
    views: ViewPersistence,
    settings: GridSettings,
    list: ListSnapshot,
    rows: Vec<Row>,
    filters: FilterState,
    query: String,
    sort: SortState,
    active_view_id: Option<String>,
    revision: u64,
    presentation: Mutex<RowPresentation>,
    observer: Option<Arc<dyn SessionObserver>>,
}

impl GridSession {
    /// Loads a list and its rows. Sort starts from the default view.
    ///
    /// # Errors
    ///
    /// [`SessionError::Backend`] when either fetch fails.
    pub async fn open(
        backend: Arc<dyn ListBackend>,
        list_id: &str,
        settings: GridSettings,
    ) -> Result<Self, SessionError> {
        let list = backend.get_list(list_id).await?;
        let items = backend
            .list_items(list_id, settings.show_deleted_rows)
            .await?;
        let sort = list
            .default_view()
            .map(|view| view.config.sort_state(&list.columns))
            .unwrap_or_default();
        info!(list = %list_id, rows = items.len(), "opened grid session");

        Ok(Self {
            views: ViewPersistence::new(backend.clone(), list_id),
            backend,
            settings,
            list,
            rows: items.into_iter().map(Row::persisted).collect(),
            filters: FilterState::new(),
            query: String::new(),
            sort,
            active_view_id: None,
            revision: 0,
            presentation: Mutex::new(RowPresentation::new()),
            observer: None,
        })
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    // ------------------------------------------------------------------
    // Read side
    // ------------------------------------------------------------------

    #[must_use]
    pub fn list_id(&self) -> &str {
        &self.list.id
    }

    #[must_use]
    pub fn list_name(&self) -> &str {
        &self.list.name
    }

    #[must_use]
    pub fn settings(&self) -> &GridSettings {
        &self.settings
    }

    /// Columns in display order.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.list.columns
    }

    #[must_use]
    pub fn views(&self) -> &[View] {
        &self.list.views
    }

    /// Canonical rows in backend order.
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Rows as the grid shows them: sorted rows, then new rows, then deleted.
    #[must_use]
    pub fn display_rows(&self) -> Vec<&Row> {
        self.presentation.lock().rows(
            self.revision,
            &self.rows,
            &self.list.columns,
            &self.filters,
            &self.query,
            &self.sort,
            &self.settings,
        )
    }

    #[must_use]
    pub fn state(&self) -> GridState {
        GridState {
            sort_column: self.sort.active().map(|(c, _)| c.to_string()),
            sort_direction: self.sort.active().map(|(_, d)| d),
            active_filters: self.filters.clone(),
            active_view_id: self.active_view_id.clone(),
            search: self.query.clone(),
        }
    }

    /// Values offered per column by the filter panel. Deleted rows are skipped.
    #[must_use]
    pub fn filter_options(&self) -> BTreeMap<String, Vec<String>> {
        filter_options(
            &self.list.columns,
            self.rows
                .iter()
                .filter(|r| !r.item.is_deleted())
                .map(|r| &r.item),
        )
    }

    /// Recycle-bin listing for this list.
    #[must_use]
    pub fn deleted_rows(&self) -> Vec<&Row> {
        self.rows.iter().filter(|r| r.item.is_deleted()).collect()
    }

    // ------------------------------------------------------------------
    // Sort, filters, views
    // ------------------------------------------------------------------

    /// Header click: cycles the sort locally, then persists it to the active
    /// view (the loaded saved view, else the default view).
    ///
    /// # Errors
    ///
    /// [`SessionError::Grid`] for an unknown column, [`SessionError::Backend`]
    /// when the view write fails. The local sort has changed either way.
    pub async fn on_sort_column(&mut self, column_id: &str) -> Result<(), SessionError> {
        self.list.require_column(column_id)?;
        self.sort = self.sort.cycle(column_id, self.settings.sort_mode());
        self.state_changed();

        let Some(view) = self.sort_target().cloned() else {
            debug!("no view to persist sort into");
            return Ok(());
        };
        let written = self.views.write_sort(&view, &self.sort).await;
        match written {
            Ok(updated) => {
                self.replace_view(updated);
                Ok(())
            }
            Err(err) => Err(self.failed("write_sort", err)),
        }
    }

    /// Replaces the sort without writing it to any view.
    ///
    /// # Errors
    ///
    /// [`SessionError::Grid`] when the sort names an unknown column.
    pub fn apply_sort(&mut self, sort: SortState) -> Result<(), SessionError> {
        if let Some((column_id, _)) = sort.active() {
            self.list.require_column(column_id)?;
        }
        self.sort = sort;
        self.state_changed();
        Ok(())
    }

    fn sort_target(&self) -> Option<&View> {
        self.active_view_id
            .as_deref()
            .and_then(|id| self.list.view(id))
            .or_else(|| self.list.default_view())
    }

    /// Replaces the filters and detaches any loaded view.
    pub fn on_filter_change(&mut self, mut filters: FilterState) {
        filters.retain(|_, accepted| !accepted.is_empty());
        self.filters = filters;
        self.detach();
        self.state_changed();
    }

    /// Checkbox toggle in the filter panel. Detaches any loaded view.
    pub fn toggle_filter(&mut self, column_id: &str, value: &str) {
        toggle_filter(&mut self.filters, column_id, value);
        self.detach();
        self.state_changed();
    }

    /// Free-text search. Not part of views, so it does not detach.
    pub fn on_search(&mut self, query: &str) {
        self.query = query.to_string();
        self.state_changed();
    }

    /// Saves the current filters and sort as a view and makes it active.
    ///
    /// # Errors
    ///
    /// [`SessionError::EmptyViewName`] for a blank name (nothing is sent),
    /// [`SessionError::Backend`] when the create fails.
    pub async fn on_save_filter(&mut self, name: &str) -> Result<View, SessionError> {
        let saved = self.views.save(name, &self.filters, &self.sort).await;
        let view = match saved {
            Ok(view) => view,
            Err(SessionError::Backend(err)) => {
                return Err(self.failed("save_view", SessionError::Backend(err)))
            }
            Err(err) => return Err(err),
        };
        self.active_view_id = Some(view.id.clone());
        self.list.views.push(view.clone());
        self.state_changed();
        Ok(view)
    }

    /// Hydrates filters and sort from a saved view and activates it.
    ///
    /// # Errors
    ///
    /// [`SessionError::UnknownView`] when the list has no such view.
    pub fn on_load_filter(&mut self, view_id: &str) -> Result<(), SessionError> {
        let view = self
            .list
            .view(view_id)
            .ok_or_else(|| SessionError::UnknownView(view_id.to_string()))?;
        let (filters, sort) = ViewPersistence::load(view, &self.list.columns);
        self.filters = filters;
        self.sort = sort;
        self.active_view_id = Some(view_id.to_string());
        self.state_changed();
        Ok(())
    }

    /// Detaches from any loaded view and resets filters and sort locally.
    pub fn on_clear_filter(&mut self) {
        let (filters, sort) = ViewPersistence::clear();
        self.filters = filters;
        self.sort = sort;
        self.detach();
        self.state_changed();
    }

    /// Deletes a saved view; clears the grid when it was the active one.
    ///
    /// # Errors
    ///
    /// [`SessionError::UnknownView`], [`SessionError::DefaultViewProtected`],
    /// or [`SessionError::Backend`] when the delete fails.
    pub async fn on_delete_filter(&mut self, view_id: &str) -> Result<(), SessionError> {
        let view = self
            .list
            .view(view_id)
            .cloned()
            .ok_or_else(|| SessionError::UnknownView(view_id.to_string()))?;
        let deleted = self.views.delete(&view).await;
        match deleted {
            Ok(()) => {}
            Err(SessionError::Backend(err)) => {
                return Err(self.failed("delete_view", SessionError::Backend(err)))
            }
            Err(err) => return Err(err),
        }
        self.list.views.retain(|v| v.id != view_id);
        if self.active_view_id.as_deref() == Some(view_id) {
            self.on_clear_filter();
        }
        Ok(())
    }

    fn detach(&mut self) {
        if let Some(view_id) = self.active_view_id.take() {
            debug!(view = %view_id, "detached from view");
        }
    }

    fn replace_view(&mut self, updated: View) {
        if let Some(slot) = self.list.views.iter_mut().find(|v| v.id == updated.id) {
            *slot = updated;
        }
    }

    // ------------------------------------------------------------------
    // Rows
    // ------------------------------------------------------------------

    /// Creates a row with each column's default value. The row stays pinned
    /// below the sorted rows until its first edit or [`Self::commit_row`].
    ///
    /// # Errors
    ///
    /// [`SessionError::Backend`] when the create or the refetch fails.
    pub async fn add_row(&mut self) -> Result<String, SessionError> {
        let defaults: BTreeMap<String, Value> = self
            .list
            .columns
            .iter()
            .filter_map(|c| c.config.default_value().map(|v| (c.id.clone(), v)))
            .collect();
        let item = match self.backend.create_item(&self.list.id, &defaults).await {
            Ok(item) => item,
            Err(err) => return Err(self.failed("create_item", err.into())),
        };
        let id = item.id.clone();
        self.rows.push(Row::pending(item));
        self.rows_changed();
        self.refresh_items().await?;
        Ok(id)
    }

    /// Writes one cell. The row leaves the pending partition immediately, even
    /// when the value did not change.
    ///
    /// # Errors
    ///
    /// [`SessionError::UnknownItem`], [`SessionError::Grid`] for an unknown
    /// column, or [`SessionError::Backend`] (the local edit is kept).
    pub async fn edit_cell(
        &mut self,
        item_id: &str,
        column_id: &str,
        value: Value,
    ) -> Result<(), SessionError> {
        self.list.require_column(column_id)?;
        let row = self.row_mut(item_id)?;
        row.item.values.insert(column_id.to_string(), value.clone());
        row.mark_persisted();
        self.rows_changed();

        let values = BTreeMap::from([(column_id.to_string(), value)]);
        if let Err(err) = self
            .backend
            .update_item_values(&self.list.id, item_id, &values)
            .await
        {
            return Err(self.failed("update_item_values", err.into()));
        }
        self.refresh_items().await
    }

    /// Like [`Self::edit_cell`], parsing raw editor text for the column type.
    ///
    /// # Errors
    ///
    /// Same as [`Self::edit_cell`].
    pub async fn edit_cell_text(
        &mut self,
        item_id: &str,
        column_id: &str,
        raw: &str,
    ) -> Result<(), SessionError> {
        let column_type = self.list.require_column(column_id)?.column_type;
        self.edit_cell(item_id, column_id, parse_cell_input(column_type, raw))
            .await
    }

    /// Ends the editing session of a new row without changing any value.
    ///
    /// # Errors
    ///
    /// [`SessionError::UnknownItem`].
    pub fn commit_row(&mut self, item_id: &str) -> Result<(), SessionError> {
        let row = self.row_mut(item_id)?;
        if row.is_pending() {
            row.mark_persisted();
            self.rows_changed();
        }
        Ok(())
    }

    /// Moves a row to the recycle bin.
    ///
    /// # Errors
    ///
    /// [`SessionError::UnknownItem`] or [`SessionError::Backend`].
    pub async fn soft_delete_row(&mut self, item_id: &str) -> Result<(), SessionError> {
        self.row_mut(item_id)?.item.deleted_at = Some(Utc::now());
        self.rows_changed();
        if let Err(err) = self.backend.soft_delete_item(&self.list.id, item_id).await {
            return Err(self.failed("soft_delete_item", err.into()));
        }
        self.refresh_items().await
    }

    /// Brings a row back from the recycle bin.
    ///
    /// # Errors
    ///
    /// [`SessionError::UnknownItem`] or [`SessionError::Backend`].
    pub async fn restore_row(&mut self, item_id: &str) -> Result<(), SessionError> {
        self.row_mut(item_id)?.item.deleted_at = None;
        self.rows_changed();
        if let Err(err) = self.backend.restore_item(&self.list.id, item_id).await {
            return Err(self.failed("restore_item", err.into()));
        }
        self.refresh_items().await
    }

    /// Deletes a row permanently.
    ///
    /// # Errors
    ///
    /// [`SessionError::UnknownItem`] or [`SessionError::Backend`].
    pub async fn purge_row(&mut self, item_id: &str) -> Result<(), SessionError> {
        self.row_mut(item_id)?;
        self.rows.retain(|r| r.id() != item_id);
        self.rows_changed();
        if let Err(err) = self.backend.purge_item(item_id).await {
            return Err(self.failed("purge_item", err.into()));
        }
        self.refresh_items().await
    }

    fn row_mut(&mut self, item_id: &str) -> Result<&mut Row, SessionError> {
        self.rows
            .iter_mut()
            .find(|r| r.id() == item_id)
            .ok_or_else(|| SessionError::UnknownItem(item_id.to_string()))
    }

    // ------------------------------------------------------------------
    // Columns
    // ------------------------------------------------------------------

    /// Drag-and-drop reorder: `dragged` takes `target`'s slot.
    ///
    /// # Errors
    ///
    /// [`SessionError::Grid`] for unknown columns, [`SessionError::Backend`].
    pub async fn move_column(&mut self, dragged: &str, target: &str) -> Result<(), SessionError> {
        self.list.require_column(dragged)?;
        self.list.require_column(target)?;
        if dragged == target {
            return Ok(());
        }
        let mut order: Vec<String> = self.list.columns.iter().map(|c| c.id.clone()).collect();
        let from = order.iter().position(|id| id == dragged);
        let to = order.iter().position(|id| id == target);
        let (Some(from), Some(to)) = (from, to) else {
            return Ok(());
        };
        let moved = order.remove(from);
        order.insert(to, moved);

        for column in &mut self.list.columns {
            if let Some(index) = order.iter().position(|id| *id == column.id) {
                column.position = i64::try_from(index).unwrap_or(i64::MAX);
            }
        }
        self.list.normalize();
        self.rows_changed();

        let reordered = self.backend.reorder_columns(&self.list.id, &order).await;
        match reordered {
            Ok(_) => self.refresh_list().await,
            Err(err) => Err(self.failed("reorder_columns", err.into())),
        }
    }

    /// Renames a column. A blank name is ignored.
    ///
    /// # Errors
    ///
    /// [`SessionError::Grid`] for an unknown column, [`SessionError::Backend`].
    pub async fn rename_column(&mut self, column_id: &str, name: &str) -> Result<(), SessionError> {
        self.list.require_column(column_id)?;
        let name = name.trim();
        if name.is_empty() {
            return Ok(());
        }
        if let Some(column) = self.list.columns.iter_mut().find(|c| c.id == column_id) {
            column.name = name.to_string();
        }
        self.rows_changed();
        self.write_column(column_id, &ColumnUpdate::rename(name)).await
    }

    /// Replaces the choice list of a choice or multiple-choice column.
    ///
    /// # Errors
    ///
    /// [`SessionError::Grid`] for an unknown or non-choice column,
    /// [`SessionError::Backend`].
    pub async fn set_column_choices(
        &mut self,
        column_id: &str,
        choices: Vec<String>,
    ) -> Result<(), SessionError> {
        let updated = self.list.require_column(column_id)?.with_choices(choices)?;
        let update = ColumnUpdate::retype(&updated);
        self.replace_column(updated);
        self.write_column(column_id, &update).await
    }

    /// Converts a text column to choice (or multiple-choice), seeding the
    /// choices from the values in the loaded rows.
    ///
    /// # Errors
    ///
    /// [`SessionError::Grid`] when the column is unknown or not text,
    /// [`SessionError::Backend`].
    pub async fn convert_column_to_choice(
        &mut self,
        column_id: &str,
        multiple: bool,
    ) -> Result<(), SessionError> {
        let target = if multiple {
            ColumnType::MultipleChoice
        } else {
            ColumnType::Choice
        };
        let converted = self
            .list
            .require_column(column_id)?
            .converted_to_choice(target, self.rows.iter().map(|r| &r.item))?;
        info!(
            column = %column_id,
            to = %target,
            choices = converted.config.choices().len(),
            "converting column"
        );
        let update = ColumnUpdate::retype(&converted);
        self.replace_column(converted);
        self.write_column(column_id, &update).await
    }

    /// Deletes a column. Local filters on it are dropped; saved views keep
    /// their stale references, which hydration ignores.
    ///
    /// # Errors
    ///
    /// [`SessionError::Grid`] for an unknown column, [`SessionError::Backend`].
    pub async fn delete_column(&mut self, column_id: &str) -> Result<(), SessionError> {
        self.list.require_column(column_id)?;
        self.list.columns.retain(|c| c.id != column_id);
        if self.filters.remove(column_id).is_some() {
            self.state_changed();
        }
        if self.sort.active().is_some_and(|(c, _)| c == column_id) {
            self.sort = SortState::unsorted();
            self.state_changed();
        }
        for row in &mut self.rows {
            row.item.values.remove(column_id);
        }
        self.rows_changed();

        if let Err(err) = self.backend.delete_column(&self.list.id, column_id).await {
            return Err(self.failed("delete_column", err.into()));
        }
        self.refresh().await
    }

    fn replace_column(&mut self, updated: Column) {
        if let Some(slot) = self.list.columns.iter_mut().find(|c| c.id == updated.id) {
            *slot = updated;
        }
        self.rows_changed();
    }

    async fn write_column(
        &mut self,
        column_id: &str,
        update: &ColumnUpdate,
    ) -> Result<(), SessionError> {
        let written = self
            .backend
            .update_column(&self.list.id, column_id, update)
            .await;
        match written {
            Ok(_) => self.refresh_list().await,
            Err(err) => Err(self.failed("update_column", err.into())),
        }
    }

    // ------------------------------------------------------------------
    // Reconciliation
    // ------------------------------------------------------------------

    /// Refetches the list and its rows.
    ///
    /// # Errors
    ///
    /// [`SessionError::Backend`] when a fetch fails; local state is kept.
    pub async fn refresh(&mut self) -> Result<(), SessionError> {
        self.refresh_list().await?;
        self.refresh_items().await
    }

    /// Refetches rows, keeping each surviving row's lifecycle state.
    async fn refresh_items(&mut self) -> Result<(), SessionError> {
        let items = self
            .backend
            .list_items(&self.list.id, self.settings.show_deleted_rows)
            .await?;
        let states: HashMap<&str, RowState> =
            self.rows.iter().map(|r| (r.id(), r.state)).collect();
        let rows: Vec<Row> = items
            .into_iter()
            .map(|item| {
                let state = states.get(item.id.as_str()).copied().unwrap_or_default();
                Row { item, state }
            })
            .collect();
        self.rows = rows;
        self.rows_changed();
        Ok(())
    }

    async fn refresh_list(&mut self) -> Result<(), SessionError> {
        let list = self.backend.get_list(&self.list.id).await?;
        if self
            .active_view_id
            .as_deref()
            .is_some_and(|id| list.view(id).is_none())
        {
            warn!("active view no longer exists");
            self.detach();
            self.state_changed();
        }
        self.list = list;
        self.rows_changed();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Notifications
    // ------------------------------------------------------------------

    fn rows_changed(&mut self) {
        self.revision += 1;
        if let Some(observer) = &self.observer {
            observer.on_rows_changed(&self.rows);
        }
    }

    fn state_changed(&mut self) {
        self.revision += 1;
        if let Some(observer) = &self.observer {
            observer.on_state_changed(&self.state());
        }
    }

    fn failed(&self, operation: &str, err: SessionError) -> SessionError {
        warn!(list = %self.list.id, operation, error = %err, "mutation failed");
        if let Some(observer) = &self.observer {
            observer.on_mutation_failed(operation, &err.to_string());
        }
        err
    }
}
