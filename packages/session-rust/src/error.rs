use listgrid_core::GridError;

/// Errors surfaced to the UI caller of a grid session.
///
/// Local validation failures (`EmptyViewName`, `DefaultViewProtected`) are
/// raised before any backend call. `Backend` wraps a failed mutation or fetch;
/// optimistic local state is left in place when it occurs.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("view name must not be empty")]
    EmptyViewName,
    #[error("unknown view: {0}")]
    UnknownView(String),
    #[error("unknown item: {0}")]
    UnknownItem(String),
    #[error("the default view cannot be deleted")]
    DefaultViewProtected,
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error("backend error: {0}")]
    Backend(#[from] anyhow::Error),
}
