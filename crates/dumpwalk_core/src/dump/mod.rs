mod error;
mod factory;
mod formatters;
mod heap;
mod image;
mod node;
mod path;
mod provider;
mod raw;
mod reader;
mod render;
mod scalar;
mod session;
mod value;

/// Error and result aliases.
pub use error::{DumpError, Result};
/// Object classification entry points.
pub use factory::{classify_address, classify_object};
/// Default value formatters and their type names.
pub use formatters::{DATE_TIME_TYPE, GUID_TYPE, format_date_time, format_guid};
/// Type-name pattern matching and heap enumeration.
pub use heap::{HeapObjects, glob_to_regex};
/// JSON heap image provider, builder, and compression detection.
pub use image::{Compression, FieldType, HeapImage, HeapImageBuilder, MAX_DECOMPRESSED_BYTES, OpenOptions, Segment, ZSTD_MAGIC};
/// Heap object graph nodes.
pub use node::{ArrayItems, DEFAULT_MAX_STRING_LEN, DumpObject, EnumNode, ErrorNode, FAILED_ADDRESS, FieldInfo, Fields, Handle, ScalarNode, Sentinel};
/// Field path parser types.
pub use path::{FieldPath, PathStep};
/// Snapshot provider interface and metadata records.
pub use provider::{Address, ArrayShape, ElementKind, EnumValue, FieldDef, HeapEntry, HeapProvider, TypeId, TypeInfo};
/// Raw value reinterpretation.
pub use raw::{RawValue, raw_bytes};
/// Storage-scoped raw readers handed to formatters.
pub use reader::{Storage, ValueReader};
/// Tree rendering limits and structured views.
pub use render::{RenderOptions, TreeField, TreeView};
/// Decoded scalar values.
pub use scalar::Scalar;
/// Snapshot session and formatter registry.
pub use session::{Dump, Formatter};
/// Typed read results.
pub use value::DumpValue;
