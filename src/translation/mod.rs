/*!
 * Batched translation of subtitle segments through a provider chain.
 *
 * This module contains the translation half of the pipeline, split into
 * several submodules:
 *
 * - `batch`: Partitioning ordered segments into provider-sized batches
 * - `parser`: Shaping free-form provider replies into ordered lines
 * - `client`: Driving a batch through the provider fallback chain
 * - `validator`: Completeness/script checks and the bounded retry protocol
 */

// Re-export main types for easier usage
pub use self::batch::{make_batches, Batch};
pub use self::client::TranslationClient;
pub use self::parser::{parse, ParsedReply};
pub use self::validator::{OperatorPrompt, QualityValidator, ValidationVerdict};

// Submodules
pub mod batch;
pub mod client;
pub mod parser;
pub mod validator;
