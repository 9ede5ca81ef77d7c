mod array;

use std::fmt;

pub use array::ArrayItems;

use crate::dump::factory::{self, Container};
use crate::dump::{Address, Dump, DumpError, DumpValue, FieldPath, PathStep, RawValue, Scalar, TypeInfo, ValueReader};

/// Default cap, in UTF-16 units, for rendered and read strings.
pub const DEFAULT_MAX_STRING_LEN: usize = 4096;

/// Address reported by failure sentinels.
pub const FAILED_ADDRESS: Address = Address::MAX;

/// One node of the heap object graph.
///
/// Nodes are produced on demand by [`Dump`] and borrow it; they are cheap to clone and never cached.
/// Navigation through [`DumpObject::field`] and [`DumpObject::array_items`] never fails: missing,
/// null, and unreadable data surface as the sentinel cases `Null`, `NotFound`, and `UnknownError`.
#[derive(Clone, Debug)]
pub enum DumpObject<'d> {
	/// Primitive scalar (bool, char, integer, float, native int).
	Primitive(ScalarNode),
	/// Enum-typed scalar.
	Enum(EnumNode<'d>),
	/// Raw data or function pointer.
	Pointer(ScalarNode),
	/// Managed string.
	String(Handle<'d>),
	/// Managed array of any rank.
	Array(Handle<'d>),
	/// Inline value type stored inside another object or array.
	ValueType(Handle<'d>),
	/// Boxed value type with its own heap header.
	Boxed(Handle<'d>),
	/// Any other managed object.
	Reference(Handle<'d>),
	/// Field that held a null reference.
	Null(Sentinel<'d>),
	/// Field name that the container type does not declare.
	NotFound(Sentinel<'d>),
	/// Raw read failure hit while resolving a field.
	UnknownError(ErrorNode<'d>),
}

/// Scalar value plus the address it was read from.
#[derive(Clone, Debug)]
pub struct ScalarNode {
	pub(crate) value: Scalar,
	pub(crate) address: Address,
}

/// Enum scalar with the enum's metadata for name lookup.
#[derive(Clone, Debug)]
pub struct EnumNode<'d> {
	pub(crate) value: Scalar,
	pub(crate) address: Address,
	pub(crate) ty: &'d TypeInfo,
}

/// Handle into the snapshot: address, declared type, and owning session.
#[derive(Clone, Copy)]
pub struct Handle<'d> {
	pub(crate) dump: &'d Dump,
	pub(crate) address: Address,
	pub(crate) ty: &'d TypeInfo,
}

/// Diagnostic context carried by `Null` and `NotFound` nodes.
#[derive(Clone, Debug)]
pub struct Sentinel<'d> {
	pub(crate) path: String,
	pub(crate) parent: Box<DumpObject<'d>>,
}

/// Diagnostic context carried by `UnknownError` nodes.
#[derive(Clone, Debug)]
pub struct ErrorNode<'d> {
	pub(crate) message: String,
	pub(crate) path: String,
	pub(crate) parent: Box<DumpObject<'d>>,
}

/// Name of one field exposed by a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldInfo<'d> {
	/// Field name.
	pub name: &'d str,
}

/// Lazy sequence of [`FieldInfo`] for one node.
pub struct Fields<'d> {
	inner: FieldsInner<'d>,
}

enum FieldsInner<'d> {
	Empty,
	Length(bool),
	Declared(std::slice::Iter<'d, crate::dump::FieldDef>),
}

impl<'d> Iterator for Fields<'d> {
	type Item = FieldInfo<'d>;

	fn next(&mut self) -> Option<Self::Item> {
		match &mut self.inner {
			FieldsInner::Empty => None,
			FieldsInner::Length(done) => {
				if *done {
					return None;
				}
				*done = true;
				Some(FieldInfo { name: "Length" })
			}
			FieldsInner::Declared(iter) => iter.next().map(|field| FieldInfo { name: field.name.as_str() }),
		}
	}
}

impl<'d> Handle<'d> {
	/// Owning session.
	pub fn dump(&self) -> &'d Dump {
		self.dump
	}

	/// Object or value address.
	pub fn address(&self) -> Address {
		self.address
	}

	/// Declared type metadata.
	pub fn type_info(&self) -> &'d TypeInfo {
		self.ty
	}

	fn object_fields(&self) -> Container<'d> {
		Container {
			ty: self.ty,
			base: self.dump.provider().object_data(self.address),
		}
	}

	fn inline_fields(&self) -> Container<'d> {
		Container {
			ty: self.ty,
			base: self.address,
		}
	}

	fn unboxed_reader(&self) -> ValueReader<'d> {
		ValueReader::unboxed(self.dump.provider(), self.address, factory::boxed_width(self))
	}

	/// Reader for the whole inline value, anchored on the field stored at offset zero.
	fn offset_zero_reader(&self) -> Option<ValueReader<'d>> {
		let field = self.ty.field_at_offset_zero()?;
		Some(ValueReader::field(self.dump.provider(), self.address, field.offset, self.ty.size as usize))
	}
}

impl fmt::Debug for Handle<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Handle")
			.field("address", &format_args!("0x{:016x}", self.address))
			.field("type", &self.ty.name)
			.finish()
	}
}

impl EnumNode<'_> {
	/// Symbolic name of the stored value, or its numeric text when no member matches.
	pub fn name(&self) -> String {
		if let Some(values) = &self.ty.enum_values {
			for item in values {
				if self.value.matches_bits(item.value) {
					return item.name.clone();
				}
			}
		}
		self.value.to_string()
	}
}

impl<'d> DumpObject<'d> {
	pub(crate) fn null(path: impl Into<String>, parent: &DumpObject<'d>) -> Self {
		Self::Null(Sentinel {
			path: path.into(),
			parent: Box::new(parent.clone()),
		})
	}

	pub(crate) fn not_found(path: impl Into<String>, parent: &DumpObject<'d>) -> Self {
		Self::NotFound(Sentinel {
			path: path.into(),
			parent: Box::new(parent.clone()),
		})
	}

	pub(crate) fn unknown_error(message: impl Into<String>, path: impl Into<String>, parent: &DumpObject<'d>) -> Self {
		Self::UnknownError(ErrorNode {
			message: message.into(),
			path: path.into(),
			parent: Box::new(parent.clone()),
		})
	}

	/// Resolve a field by name.
	///
	/// Missing fields yield `NotFound`, null references yield `Null`, and read failures yield
	/// `UnknownError`. Sentinels extend their diagnostic path (`a.b`) instead of resolving.
	pub fn field(&self, name: &str) -> DumpObject<'d> {
		match self {
			Self::Primitive(_) | Self::Enum(_) | Self::Pointer(_) | Self::String(_) => Self::not_found(name, self),
			Self::Array(handle) => {
				if name != "Length" {
					return Self::not_found(name, self);
				}
				let total = handle.dump.provider().array_shape(handle.address).and_then(|shape| {
					shape.total_len().ok_or(DumpError::MalformedArray { address: handle.address })
				});
				match total {
					Ok(total) => Self::Primitive(ScalarNode {
						value: Scalar::from_i32(total.min(i32::MAX as u64) as i32),
						address: handle.address,
					}),
					Err(err) => Self::unknown_error(err.to_string(), name, self),
				}
			}
			Self::ValueType(handle) => factory::resolve_field(handle.dump, handle.inline_fields(), name, self),
			Self::Boxed(handle) => {
				let view = Self::Reference(*handle);
				factory::resolve_field(handle.dump, handle.object_fields(), name, &view)
			}
			Self::Reference(handle) => factory::resolve_field(handle.dump, handle.object_fields(), name, self),
			Self::Null(sentinel) => Self::Null(sentinel.extend(&format!(".{name}"))),
			Self::NotFound(sentinel) => Self::NotFound(sentinel.extend(&format!(".{name}"))),
			Self::UnknownError(_) => self.clone(),
		}
	}

	/// Memory address of the node: `0` for `Null`, [`FAILED_ADDRESS`] for failure sentinels.
	pub fn address(&self) -> Address {
		match self {
			Self::Primitive(node) | Self::Pointer(node) => node.address,
			Self::Enum(node) => node.address,
			Self::String(handle) | Self::Array(handle) | Self::ValueType(handle) | Self::Boxed(handle) | Self::Reference(handle) => handle.address,
			Self::Null(_) => 0,
			Self::NotFound(_) | Self::UnknownError(_) => FAILED_ADDRESS,
		}
	}

	/// Render the node as a single display value when it has one.
	///
	/// Succeeds for scalars, strings, `Null`, and inline or boxed values whose type has a registered
	/// formatter (boxed primitives and enums always render).
	pub fn render_value(&self) -> Option<String> {
		match self {
			Self::Primitive(node) | Self::Pointer(node) => Some(node.value.to_string()),
			Self::Enum(node) => Some(node.name()),
			Self::String(handle) => Some(match handle.dump.provider().read_string(handle.address, DEFAULT_MAX_STRING_LEN) {
				Ok(text) => text,
				Err(err) => format!("<unreadable: {err}>"),
			}),
			Self::ValueType(handle) => {
				let reader = handle.offset_zero_reader()?;
				handle.dump.format_value(&handle.ty.name, &reader)
			}
			Self::Boxed(handle) => {
				if handle.ty.element.is_primitive() || handle.ty.element.is_pointer() {
					let rendered = match factory::read_boxed_scalar(handle) {
						Ok(node) => node.render_value().unwrap_or_default(),
						Err(err) => format!("<unreadable: {err}>"),
					};
					return Some(rendered);
				}
				handle.dump.format_value(&handle.ty.name, &handle.unboxed_reader())
			}
			Self::Null(_) => Some("null".to_owned()),
			Self::Array(_) | Self::Reference(_) | Self::NotFound(_) | Self::UnknownError(_) => None,
		}
	}

	/// Whether the node is an array.
	pub fn is_array(&self) -> bool {
		matches!(self, Self::Array(_))
	}

	/// Enumerate the names of the node's fields.
	pub fn fields(&self) -> Fields<'d> {
		let inner = match self {
			Self::Array(_) => FieldsInner::Length(false),
			Self::ValueType(handle) | Self::Boxed(handle) | Self::Reference(handle) => FieldsInner::Declared(handle.ty.fields.iter()),
			_ => FieldsInner::Empty,
		};
		Fields { inner }
	}

	/// Error description when this node is an `UnknownError`.
	pub fn error(&self) -> Option<String> {
		match self {
			Self::UnknownError(_) => Some(self.describe()),
			_ => None,
		}
	}

	/// Reinterpret the node's value bits as `T`.
	///
	/// Succeeds only when `T` has exactly the width of the underlying value.
	pub fn read_as<T: RawValue>(&self) -> DumpValue<T> {
		match self {
			Self::Primitive(node) | Self::Pointer(node) => reinterpret(&node.value, node.value.type_name()),
			Self::Enum(node) => reinterpret(&node.value, &node.ty.name),
			Self::String(handle) | Self::Array(handle) | Self::Reference(handle) => DumpValue::unsupported_read(&handle.ty.name),
			Self::Boxed(handle) => {
				let size = factory::boxed_width(handle);
				if T::SIZE != size {
					return DumpValue::size_mismatch(&handle.ty.name, size);
				}
				read_value(&handle.unboxed_reader())
			}
			Self::ValueType(handle) => {
				let Some(reader) = handle.offset_zero_reader() else {
					return DumpValue::no_field_at_offset_zero(&handle.ty.name);
				};
				let size = handle.ty.size as usize;
				if T::SIZE != size {
					return DumpValue::size_mismatch(&handle.ty.name, size);
				}
				read_value(&reader)
			}
			Self::Null(_) | Self::NotFound(_) | Self::UnknownError(_) => DumpValue::from_failed_object(&self.describe()),
		}
	}

	/// Read the node as text: string contents (truncated to `max_len` units) or an enum name.
	pub fn as_string(&self, max_len: usize) -> DumpValue<String> {
		match self {
			Self::Enum(node) => DumpValue::ok(node.name()),
			Self::String(handle) => match handle.dump.provider().read_string(handle.address, max_len) {
				Ok(text) => DumpValue::ok(text),
				Err(err) => DumpValue::failed(err.to_string()),
			},
			Self::Primitive(node) | Self::Pointer(node) => DumpValue::unsupported_string(node.value.type_name()),
			Self::Array(handle) | Self::ValueType(handle) | Self::Boxed(handle) | Self::Reference(handle) => DumpValue::unsupported_string(&handle.ty.name),
			Self::Null(_) | Self::NotFound(_) | Self::UnknownError(_) => DumpValue::from_failed_object(&self.describe()),
		}
	}

	/// Enumerate array elements, dimension 0 varying fastest. Empty for non-arrays.
	pub fn array_items(&self) -> ArrayItems<'d> {
		match self {
			Self::Array(handle) => ArrayItems::new(self, *handle),
			_ => ArrayItems::empty(),
		}
	}

	/// Select one array element by zero-based position along each dimension.
	///
	/// Non-arrays and out-of-range positions yield `NotFound`; sentinels extend their path.
	pub fn array_item(&self, position: &[usize]) -> DumpObject<'d> {
		let label = array::format_positions(position);
		match self {
			Self::Array(handle) => array::item_at(self, *handle, position),
			Self::Null(sentinel) => Self::Null(sentinel.extend(&label)),
			Self::NotFound(sentinel) => Self::NotFound(sentinel.extend(&label)),
			Self::UnknownError(_) => self.clone(),
			_ => Self::not_found(label, self),
		}
	}

	/// Follow every step of a parsed field path.
	pub fn navigate(&self, path: &FieldPath) -> DumpObject<'d> {
		let mut current = self.clone();
		for step in &path.steps {
			current = match step {
				PathStep::Field(name) => current.field(name),
				PathStep::Index(position) => current.array_item(position),
			};
		}
		current
	}

	/// Declared type name, or a kind label for sentinels.
	pub fn type_name(&self) -> &str {
		match self {
			Self::Primitive(node) | Self::Pointer(node) => node.value.type_name(),
			Self::Enum(node) => &node.ty.name,
			Self::String(handle) | Self::Array(handle) | Self::ValueType(handle) | Self::Boxed(handle) | Self::Reference(handle) => &handle.ty.name,
			Self::Null(_) => "null",
			Self::NotFound(_) => "<not found>",
			Self::UnknownError(_) => "<error>",
		}
	}

	/// Whether the node is one of the `Null`, `NotFound`, or `UnknownError` sentinels.
	pub fn is_sentinel(&self) -> bool {
		matches!(self, Self::Null(_) | Self::NotFound(_) | Self::UnknownError(_))
	}

	/// Dotted field path recorded by a sentinel.
	pub fn sentinel_path(&self) -> Option<&str> {
		match self {
			Self::Null(sentinel) | Self::NotFound(sentinel) => Some(&sentinel.path),
			Self::UnknownError(node) => Some(&node.path),
			_ => None,
		}
	}

	/// Root-level textual description, as printed by [`fmt::Display`].
	pub fn describe(&self) -> String {
		self.to_string()
	}
}

impl<'d> Sentinel<'d> {
	fn extend(&self, suffix: &str) -> Self {
		Self {
			path: format!("{}{suffix}", self.path),
			parent: self.parent.clone(),
		}
	}
}

fn reinterpret<T: RawValue>(value: &Scalar, type_name: &str) -> DumpValue<T> {
	if T::SIZE != value.size() {
		return DumpValue::size_mismatch(type_name, value.size());
	}
	DumpValue::ok(T::from_raw(&value.bytes()))
}

fn read_value<T: RawValue>(reader: &ValueReader<'_>) -> DumpValue<T> {
	match reader.read::<T>() {
		Ok(value) => DumpValue::ok(value),
		Err(err) => DumpValue::failed(err.to_string()),
	}
}

#[cfg(test)]
mod tests;
