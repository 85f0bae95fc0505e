pub mod common;
pub mod source;

// Ré-export des éléments courants
pub use common::{truncate_chars, ClassifiedEmail, RawEmail, BODY_MAX_CHARS};
pub use source::{EmailSource, JsonFileSource};
