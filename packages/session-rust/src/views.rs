//! Persisting filter and sort state as named views.

use std::sync::Arc;

use tracing::info;

use listgrid_core::{Column, FilterState, SortState, View, ViewConfig};

use crate::error::SessionError;
use crate::traits::ListBackend;

/// Maps in-memory filter/sort state to and from the views of one list.
#[derive(Clone)]
pub struct ViewPersistence {
    backend: Arc<dyn ListBackend>,
    list_id: String,
}

impl ViewPersistence {
    #[must_use]
    pub fn new(backend: Arc<dyn ListBackend>, list_id: impl Into<String>) -> Self {
        Self {
            backend,
            list_id: list_id.into(),
        }
    }

    /// Saves the current filters and sort as a new non-default view.
    ///
    /// # Errors
    ///
    /// [`SessionError::EmptyViewName`] when `name` is blank (no backend call
    /// is made), [`SessionError::Backend`] when the create fails.
    pub async fn save(
        &self,
        name: &str,
        filters: &FilterState,
        sort: &SortState,
    ) -> Result<View, SessionError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SessionError::EmptyViewName);
        }
        let config = ViewConfig::with_state(filters, sort);
        let view = self
            .backend
            .create_view(&self.list_id, name, &config)
            .await?;
        info!(list = %self.list_id, view = %view.id, name, "saved view");
        Ok(view)
    }

    /// Filter and sort state stored in `view`. The view is not modified.
    #[must_use]
    pub fn load(view: &View, columns: &[Column]) -> (FilterState, SortState) {
        view.config.hydrate(columns)
    }

    /// Empty filters and no sort. Nothing is deleted.
    #[must_use]
    pub fn clear() -> (FilterState, SortState) {
        (FilterState::new(), SortState::unsorted())
    }

    /// Deletes a saved view.
    ///
    /// # Errors
    ///
    /// [`SessionError::DefaultViewProtected`] for the default view,
    /// [`SessionError::Backend`] when the delete fails.
    pub async fn delete(&self, view: &View) -> Result<(), SessionError> {
        if view.is_default {
            return Err(SessionError::DefaultViewProtected);
        }
        self.backend.delete_view(&self.list_id, &view.id).await?;
        info!(list = %self.list_id, view = %view.id, "deleted view");
        Ok(())
    }

    /// Writes `sort` into `view`'s config, keeping every other config key.
    ///
    /// # Errors
    ///
    /// [`SessionError::Backend`] when the update fails.
    pub async fn write_sort(&self, view: &View, sort: &SortState) -> Result<View, SessionError> {
        let mut config = view.config.clone();
        config.set_sort(sort);
        Ok(self
            .backend
            .update_view(&self.list_id, &view.id, &config)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use listgrid_core::{ColumnType, ListSnapshot, SortDirection};
    use serde_json::json;

    use super::*;
    use crate::backend::MemoryBackend;

    fn setup() -> (Arc<MemoryBackend>, ViewPersistence) {
        let backend = Arc::new(MemoryBackend::new());
        let mut default_view = View::new("v0", "l1", "All Items", true);
        default_view
            .config
            .extra
            .insert("columnWidths".to_string(), json!({"c1": 200}));
        backend.insert_list(ListSnapshot {
            id: "l1".to_string(),
            name: "Books".to_string(),
            columns: vec![Column::new("c1", "Status", ColumnType::Choice)],
            views: vec![default_view],
        });
        let persistence = ViewPersistence::new(backend.clone(), "l1");
        (backend, persistence)
    }

    fn done_filter() -> FilterState {
        let mut filters = FilterState::new();
        filters.insert("c1".to_string(), BTreeSet::from(["Done".to_string()]));
        filters
    }

    #[tokio::test]
    async fn blank_name_is_rejected_without_backend_call() {
        let (backend, persistence) = setup();
        let err = persistence
            .save("   ", &done_filter(), &SortState::unsorted())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::EmptyViewName));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let (_, persistence) = setup();
        let sort = SortState::by("c1", SortDirection::Desc);
        let view = persistence.save(" Done ", &done_filter(), &sort).await.unwrap();
        assert_eq!(view.name, "Done");
        assert!(!view.is_default);

        let columns = vec![Column::new("c1", "Status", ColumnType::Choice)];
        let (filters, loaded_sort) = ViewPersistence::load(&view, &columns);
        assert_eq!(filters, done_filter());
        assert_eq!(loaded_sort, sort);
    }

    #[tokio::test]
    async fn default_view_cannot_be_deleted() {
        let (backend, persistence) = setup();
        let default_view = backend.view("l1", "v0").unwrap();
        let err = persistence.delete(&default_view).await.unwrap_err();
        assert!(matches!(err, SessionError::DefaultViewProtected));
        assert!(backend.view("l1", "v0").is_some());
    }

    #[tokio::test]
    async fn write_sort_keeps_other_config_keys() {
        let (backend, persistence) = setup();
        let default_view = backend.view("l1", "v0").unwrap();
        persistence
            .write_sort(&default_view, &SortState::by("c1", SortDirection::Asc))
            .await
            .unwrap();
        let stored = backend.view("l1", "v0").unwrap();
        assert_eq!(stored.config.sort_by.as_deref(), Some("c1"));
        assert_eq!(stored.config.extra["columnWidths"], json!({"c1": 200}));
    }

    #[test]
    fn clear_is_empty() {
        let (filters, sort) = ViewPersistence::clear();
        assert!(filters.is_empty());
        assert!(!sort.is_sorted());
    }
}
