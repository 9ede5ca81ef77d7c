use thiserror::Error;

use crate::dump::{Address, ElementKind, TypeId};

/// Crate-local result type.
pub type Result<T> = std::result::Result<T, DumpError>;

/// Errors produced while loading snapshots and reading raw heap memory.
#[derive(Debug, Error)]
pub enum DumpError {
	/// Filesystem or stream IO failure.
	#[error("io: {0}")]
	Io(#[from] std::io::Error),
	/// Heap image document could not be decoded.
	#[error("invalid heap image json: {0}")]
	Json(#[from] serde_json::Error),
	/// Unknown leading file magic.
	#[error("unsupported compression or not a heap image (magic={magic:?})")]
	UnknownMagic {
		/// First up-to-4 bytes of the stream.
		magic: [u8; 4],
	},
	/// Decompression output exceeded configured safety limit.
	#[error("decompressed output exceeded limit {limit} bytes")]
	DecompressedTooLarge {
		/// Maximum allowed output bytes.
		limit: usize,
	},
	/// Image declared a word size the reader cannot handle.
	#[error("unsupported pointer size {size} (expected 4 or 8)")]
	UnsupportedPointerSize {
		/// Declared pointer width in bytes.
		size: usize,
	},
	/// Two type records share one type id.
	#[error("duplicate type id 0x{id:x}")]
	DuplicateTypeId {
		/// Duplicated type id value.
		id: u64,
	},
	/// Two memory segments claim overlapping address ranges.
	#[error("memory segments overlap at 0x{address:016x}")]
	OverlappingSegments {
		/// Start address of the later segment.
		address: Address,
	},
	/// A null handle was passed where a live object is required.
	#[error("cannot classify a null object reference")]
	NullHandle,
	/// Type id is not present in the snapshot metadata.
	#[error("unknown type id {type_id} at 0x{address:016x}")]
	UnknownType {
		/// Unresolved type id.
		type_id: TypeId,
		/// Address the type id was read from.
		address: Address,
	},
	/// Memory read touched bytes outside every captured segment.
	#[error("unmapped read of {len} bytes at 0x{address:016x}")]
	UnmappedRead {
		/// Start address of the read.
		address: Address,
		/// Requested byte count.
		len: usize,
	},
	/// Typed read asked for more bytes than its storage holds.
	#[error("read of {want} bytes exceeds {have}-byte storage at 0x{address:016x}")]
	ReadTooWide {
		/// Start address of the storage.
		address: Address,
		/// Requested byte count.
		want: usize,
		/// Bytes available in the storage.
		have: usize,
	},
	/// Field or array component refers to a type with no metadata.
	#[error("missing type metadata for {context}")]
	MissingTypeMetadata {
		/// Field name or array type name lacking metadata.
		context: String,
	},
	/// Element kind cannot be decoded as a scalar.
	#[error("element kind {kind:?} is not a scalar")]
	NotScalar {
		/// Offending element kind.
		kind: ElementKind,
	},
	/// Object is not an array.
	#[error("object at 0x{address:016x} is not an array")]
	NotAnArray {
		/// Object address.
		address: Address,
	},
	/// Object is not a string.
	#[error("object at 0x{address:016x} is not a string")]
	NotAString {
		/// Object address.
		address: Address,
	},
	/// Array header declared an impossible rank or length.
	#[error("malformed array header at 0x{address:016x}")]
	MalformedArray {
		/// Array object address.
		address: Address,
	},
	/// Array element index does not fall inside the array bounds.
	#[error("array index {index:?} out of bounds")]
	IndexOutOfBounds {
		/// Offending index tuple.
		index: Vec<i32>,
	},
	/// Stored bits do not encode a valid value of the type.
	#[error("invalid {type_name} value: {reason}")]
	InvalidValue {
		/// Type being decoded.
		type_name: String,
		/// Decoder diagnostic.
		reason: String,
	},
	/// Class name pattern did not compile.
	#[error("invalid class name pattern: {0}")]
	InvalidPattern(#[from] regex::Error),
	/// Path expression syntax is invalid.
	#[error("invalid field path: {path}")]
	InvalidFieldPath {
		/// Original user-provided path string.
		path: String,
	},
	/// Builder referenced a field that the type does not declare.
	#[error("type {type_name} has no field {field}")]
	NoSuchField {
		/// Declaring type name.
		type_name: String,
		/// Missing field name.
		field: String,
	},
	/// CLI address argument was invalid.
	#[error("invalid address literal: {value}")]
	InvalidAddressLiteral {
		/// User-provided literal.
		value: String,
	},
}
