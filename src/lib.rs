//! Migrates a live SQL Server database into a freshly created SQLite
//! file: introspects the source catalog, synthesizes an equivalent
//! SQLite schema, copies every row, and optionally emits FK-emulation
//! triggers and translated views.

pub mod convert;
pub mod coordinator;
pub mod error;
pub mod handlers;
pub mod schema;
pub mod source;

pub use convert::{convert, ConvertOptions};
pub use coordinator::ConversionCoordinator;
pub use error::{ConvertError, ConvertResult};
pub use handlers::{LoggingProgressHandler, ProgressHandler, TableSelectionHandler, ViewFailureHandler};
