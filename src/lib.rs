//! Sensor Lens - Decoder and annotated viewer for obfuscated behavioral sensor payloads
//!
//! Lens turns a captured sensor payload into an ordered record through a
//! deterministic pipeline: envelope parsing → key extraction → two keyed
//! de-obfuscation passes → separator discovery → field pairing. The record can
//! then be rendered as an annotated, width-aware information tree.
//!
//! ## Modules
//!
//! - **Decoding**: `decoder` and `transform` produce an [`OrderedRecord`]
//! - **Field model**: `fields` and `stream` derive values and activity analytics
//! - **Rendering**: `render` draws trees declared in `catalog`, gated by `check`

pub mod catalog;
pub mod check;
pub mod decoder;
pub mod error;
pub mod fields;
pub mod render;
pub mod stream;
pub mod transform;
pub mod types;

pub use catalog::{information_tree, record_tree};
pub use check::{RecordCheck, RequiredFields};
pub use decoder::{decode_payload, SensorDecoder};
pub use error::{DecodeError, FieldError, TransformError};
pub use render::{render_information, Node, TreeRenderer};
pub use stream::StreamKind;
pub use transform::{ByteTransform, CharSubstitution, FieldShuffle};
pub use types::{FieldValue, OrderedRecord};

/// Lens version reported by the CLI
pub const LENS_VERSION: &str = env!("CARGO_PKG_VERSION");
