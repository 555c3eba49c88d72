//! Read PDF documents aloud, one sentence at a time.
//!
//! Text fragments are pulled out of each page, regrouped into lines and
//! paragraphs, split into sentences and handed to a [`narration::NarrationEngine`]
//! one unit at a time. [`session::ReaderSession`] ties loading, narration,
//! voice choice and in-place editing together behind a command interface a
//! host UI can drive.

pub mod cancellation;
pub mod config;
pub mod document;
pub mod edit;
pub mod error;
pub mod extract;
pub mod logging;
pub mod narration;
pub mod reconstruct;
pub mod session;
pub mod text_utils;

pub use cancellation::CancellationToken;
pub use config::{AppConfig, load_config};
pub use document::DocumentModel;
pub use error::{DocumentParseError, InvalidOperation, NarrationEngineError, ReaderError};
pub use session::{ReaderSession, RenderUpdate, SessionCommand, SessionEvent};
