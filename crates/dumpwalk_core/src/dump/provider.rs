use std::fmt;

use serde::{Deserialize, Serialize};

use crate::dump::{DumpError, Result};

/// Virtual address inside the captured process.
pub type Address = u64;

/// Unique identity of one type in snapshot metadata (the runtime's method-table word).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeId(pub u64);

impl fmt::Display for TypeId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "0x{:x}", self.0)
	}
}

/// Runtime element category of a type or field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
	/// No storage.
	Void,
	/// One-byte boolean.
	Boolean,
	/// UTF-16 code unit.
	Char,
	/// Signed 8-bit integer.
	Int8,
	/// Unsigned 8-bit integer.
	UInt8,
	/// Signed 16-bit integer.
	Int16,
	/// Unsigned 16-bit integer.
	UInt16,
	/// Signed 32-bit integer.
	Int32,
	/// Unsigned 32-bit integer.
	UInt32,
	/// Signed 64-bit integer.
	Int64,
	/// Unsigned 64-bit integer.
	UInt64,
	/// 32-bit IEEE float.
	Float,
	/// 64-bit IEEE float.
	Double,
	/// Signed pointer-width integer.
	NativeInt,
	/// Unsigned pointer-width integer.
	NativeUInt,
	/// Unmanaged data pointer.
	Pointer,
	/// Unmanaged function pointer.
	FunctionPointer,
	/// Managed string reference.
	String,
	/// Managed class reference.
	Class,
	/// Untyped managed object reference.
	Object,
	/// Inline value type.
	Struct,
	/// Single-dimension zero-based array reference.
	SzArray,
	/// Multi-dimension array reference.
	Array,
}

impl ElementKind {
	/// Whether the element is a fixed-width scalar (bool, char, integers, floats, native ints).
	pub fn is_primitive(self) -> bool {
		matches!(
			self,
			Self::Boolean
				| Self::Char
				| Self::Int8
				| Self::UInt8
				| Self::Int16
				| Self::UInt16
				| Self::Int32
				| Self::UInt32
				| Self::Int64
				| Self::UInt64
				| Self::Float
				| Self::Double
				| Self::NativeInt
				| Self::NativeUInt
		)
	}

	/// Whether storage holds a reference to another heap object.
	pub fn is_object_reference(self) -> bool {
		matches!(self, Self::String | Self::Class | Self::Object | Self::SzArray | Self::Array)
	}

	/// Whether storage holds an unmanaged or function pointer.
	pub fn is_pointer(self) -> bool {
		matches!(self, Self::Pointer | Self::FunctionPointer)
	}

	/// Storage width for scalar, pointer, and reference kinds.
	pub fn scalar_size(self, pointer_size: usize) -> Option<usize> {
		match self {
			Self::Boolean | Self::Int8 | Self::UInt8 => Some(1),
			Self::Char | Self::Int16 | Self::UInt16 => Some(2),
			Self::Int32 | Self::UInt32 | Self::Float => Some(4),
			Self::Int64 | Self::UInt64 | Self::Double => Some(8),
			Self::NativeInt | Self::NativeUInt | Self::Pointer | Self::FunctionPointer => Some(pointer_size),
			kind if kind.is_object_reference() => Some(pointer_size),
			_ => None,
		}
	}

	/// Runtime type name used when reporting this kind.
	pub fn type_name(self) -> &'static str {
		match self {
			Self::Void => "System.Void",
			Self::Boolean => "System.Boolean",
			Self::Char => "System.Char",
			Self::Int8 => "System.SByte",
			Self::UInt8 => "System.Byte",
			Self::Int16 => "System.Int16",
			Self::UInt16 => "System.UInt16",
			Self::Int32 => "System.Int32",
			Self::UInt32 => "System.UInt32",
			Self::Int64 => "System.Int64",
			Self::UInt64 => "System.UInt64",
			Self::Float => "System.Single",
			Self::Double => "System.Double",
			Self::NativeInt => "System.IntPtr",
			Self::NativeUInt | Self::Pointer | Self::FunctionPointer => "System.UIntPtr",
			Self::String => "System.String",
			Self::Class | Self::Object => "System.Object",
			Self::Struct => "System.ValueType",
			Self::SzArray | Self::Array => "System.Array",
		}
	}
}

/// One declared instance field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
	/// Field name.
	pub name: String,
	/// Storage category.
	pub element: ElementKind,
	/// Declared field type, required for enums and inline structs.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub type_id: Option<TypeId>,
	/// Byte offset from the start of the container's field storage.
	pub offset: u32,
}

/// One declared enum member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumValue {
	/// Symbolic member name.
	pub name: String,
	/// Member value bits, sign-extended to 64 bits for signed underlying kinds.
	pub value: u64,
}

/// Type metadata record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeInfo {
	/// Unique type identity.
	pub id: TypeId,
	/// Fully-qualified type name.
	pub name: String,
	/// Element category; enums carry their underlying integer kind here.
	pub element: ElementKind,
	/// Payload size for value types, instance field storage size for classes.
	#[serde(default)]
	pub size: u32,
	/// Declared instance fields.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub fields: Vec<FieldDef>,
	/// Array component type.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub component: Option<TypeId>,
	/// Array rank (0 for non-arrays).
	#[serde(default)]
	pub rank: u32,
	/// Declared enum members when this type is an enum.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub enum_values: Option<Vec<EnumValue>>,
}

impl TypeInfo {
	/// Whether this is the managed string type.
	pub fn is_string(&self) -> bool {
		self.element == ElementKind::String
	}

	/// Whether this is an array type of any rank.
	pub fn is_array(&self) -> bool {
		matches!(self.element, ElementKind::SzArray | ElementKind::Array)
	}

	/// Whether this is an enum type.
	pub fn is_enum(&self) -> bool {
		self.enum_values.is_some()
	}

	/// Whether this is a primitive scalar type (enums excluded).
	pub fn is_primitive(&self) -> bool {
		self.element.is_primitive() && !self.is_enum()
	}

	/// Whether instances are value types (structs, primitives, enums, pointers).
	pub fn is_value_type(&self) -> bool {
		self.element == ElementKind::Struct || self.element.is_primitive() || self.element.is_pointer()
	}

	/// Look up a declared field by exact name.
	pub fn field_by_name(&self, name: &str) -> Option<&FieldDef> {
		self.fields.iter().find(|field| field.name == name)
	}

	/// Return the first declared field stored at offset zero.
	pub fn field_at_offset_zero(&self) -> Option<&FieldDef> {
		self.fields.iter().find(|field| field.offset == 0)
	}
}

/// One raw heap walk entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapEntry {
	/// Object address.
	pub address: Address,
	/// Whether the provider could validate the object header.
	pub valid: bool,
}

/// Dimensions and storage of one array object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayShape {
	/// Address of element `[lower bounds...]`.
	pub data: Address,
	/// Element count per dimension.
	pub lengths: Vec<u32>,
	/// Lower bound per dimension.
	pub lower_bounds: Vec<i32>,
}

impl ArrayShape {
	/// Number of dimensions.
	pub fn rank(&self) -> usize {
		self.lengths.len()
	}

	/// Total number of elements across all dimensions, `None` when the product overflows.
	pub fn total_len(&self) -> Option<u64> {
		if self.lengths.is_empty() {
			return Some(0);
		}
		self.lengths.iter().try_fold(1_u64, |acc, len| acc.checked_mul(u64::from(*len)))
	}

	/// Inclusive upper bound of one dimension.
	pub fn upper_bound(&self, dim: usize) -> i64 {
		i64::from(self.lower_bounds[dim]) + i64::from(self.lengths[dim]) - 1
	}

	/// Row-major element position for an index tuple.
	pub fn linear_index(&self, index: &[i32]) -> Result<u64> {
		if index.len() != self.rank() {
			return Err(DumpError::IndexOutOfBounds { index: index.to_vec() });
		}

		let mut linear = 0_u64;
		for (dim, value) in index.iter().enumerate() {
			let relative = i64::from(*value) - i64::from(self.lower_bounds[dim]);
			if relative < 0 || relative >= i64::from(self.lengths[dim]) {
				return Err(DumpError::IndexOutOfBounds { index: index.to_vec() });
			}
			linear = linear
				.checked_mul(u64::from(self.lengths[dim]))
				.and_then(|scaled| scaled.checked_add(relative as u64))
				.ok_or_else(|| DumpError::IndexOutOfBounds { index: index.to_vec() })?;
		}
		Ok(linear)
	}
}

/// Snapshot and type-metadata provider consumed by the heap object model.
///
/// Implementations own the underlying snapshot resources; dropping the provider releases them.
pub trait HeapProvider {
	/// Word width of the captured process in bytes.
	fn pointer_size(&self) -> usize;

	/// Look up type metadata by identity.
	fn type_info(&self, id: TypeId) -> Option<&TypeInfo>;

	/// Resolve the type identity of the object at `address`.
	fn object_type(&self, address: Address) -> Result<TypeId>;

	/// Copy `buf.len()` bytes starting at `address`.
	fn read_memory(&self, address: Address, buf: &mut [u8]) -> Result<()>;

	/// Walk every object on the captured heap, in heap order.
	fn heap_objects(&self) -> Box<dyn Iterator<Item = HeapEntry> + '_>;

	/// Read the dimensions of the array object at `address`.
	fn array_shape(&self, address: Address) -> Result<ArrayShape>;

	/// Read up to `max_len` UTF-16 units of the string object at `address`.
	fn read_string(&self, address: Address, max_len: usize) -> Result<String>;

	/// Read one native-width word.
	fn read_pointer(&self, address: Address) -> Result<Address> {
		match self.pointer_size() {
			4 => {
				let mut buf = [0_u8; 4];
				self.read_memory(address, &mut buf)?;
				Ok(u64::from(u32::from_le_bytes(buf)))
			}
			8 => {
				let mut buf = [0_u8; 8];
				self.read_memory(address, &mut buf)?;
				Ok(u64::from_le_bytes(buf))
			}
			size => Err(DumpError::UnsupportedPointerSize { size }),
		}
	}

	/// Address where the instance fields of the object at `address` begin.
	fn object_data(&self, address: Address) -> Address {
		address.wrapping_add(self.pointer_size() as u64)
	}
}
