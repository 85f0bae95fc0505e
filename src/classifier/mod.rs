pub mod batch;
pub mod category;
pub mod completion;
pub mod error;
pub mod pacing;
pub mod single;

pub use batch::{BatchClassifier, BatchOutcome, BatchSummary};
pub use category::{Category, UnknownCategory};
pub use completion::{ChatCompletionsClient, CompletionClient, CompletionRequest, Credential};
pub use error::ClassificationError;
pub use pacing::{Clock, Pacer, TokioClock};
pub use single::{EmailClassifier, DEFAULT_PROMPT_TEMPLATE, DEFAULT_SYSTEM_PROMPT};
