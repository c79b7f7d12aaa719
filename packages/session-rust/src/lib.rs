//! `ListGrid` Session: one user's interactive grid over a list service.
//!
//! [`GridSession`] holds the local grid state and the UI handlers; it talks to
//! the service through a [`ListBackend`]. [`HttpBackend`] speaks the REST API,
//! [`MemoryBackend`] keeps everything in process for tests and demos.

pub mod backend;
pub mod error;
pub mod observer;
pub mod session;
pub mod traits;
pub mod views;

pub use backend::{HttpBackend, HttpBackendConfig, MemoryBackend};
pub use error::SessionError;
pub use observer::{CompositeSessionObserver, SessionObserver};
pub use session::{GridSession, GridState};
pub use traits::ListBackend;
pub use views::ViewPersistence;
