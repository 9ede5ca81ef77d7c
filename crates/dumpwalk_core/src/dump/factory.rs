//! Node classification: which [`DumpObject`] case represents a heap object or a field.

use tracing::trace;

use crate::dump::node::{EnumNode, Handle, ScalarNode};
use crate::dump::{Address, Dump, DumpError, DumpObject, ElementKind, Result, Scalar, TypeInfo, ValueReader};

/// Field storage of one container: its type plus where field offsets are measured from.
#[derive(Clone, Copy)]
pub(crate) struct Container<'d> {
	pub(crate) ty: &'d TypeInfo,
	pub(crate) base: Address,
}

/// Classify a heap object by its runtime type.
///
/// Value types on the heap are boxed; arrays, strings, and everything else follow in that order.
pub fn classify_object<'d>(dump: &'d Dump, address: Address, ty: &'d TypeInfo) -> DumpObject<'d> {
	let handle = Handle { dump, address, ty };
	if ty.is_value_type() {
		DumpObject::Boxed(handle)
	} else if ty.is_array() {
		DumpObject::Array(handle)
	} else if ty.is_string() {
		DumpObject::String(handle)
	} else {
		DumpObject::Reference(handle)
	}
}

/// Resolve the runtime type of the object at `address` and classify it.
pub fn classify_address(dump: &Dump, address: Address) -> Result<DumpObject<'_>> {
	if address == 0 {
		return Err(DumpError::NullHandle);
	}
	let type_id = dump.provider().object_type(address)?;
	let ty = dump
		.provider()
		.type_info(type_id)
		.ok_or(DumpError::UnknownType { type_id, address })?;
	Ok(classify_object(dump, address, ty))
}

/// Resolve `name` inside `container`, converting any read failure into `UnknownError`.
pub(crate) fn resolve_field<'d>(dump: &'d Dump, container: Container<'d>, name: &str, parent: &DumpObject<'d>) -> DumpObject<'d> {
	match try_resolve_field(dump, container, name, parent) {
		Ok(node) => node,
		Err(err) => {
			trace!(field = name, container = container.ty.name.as_str(), %err, "field read failed");
			DumpObject::unknown_error(err.to_string(), name, parent)
		}
	}
}

fn try_resolve_field<'d>(dump: &'d Dump, container: Container<'d>, name: &str, parent: &DumpObject<'d>) -> Result<DumpObject<'d>> {
	let Some(field) = container.ty.field_by_name(name) else {
		return Ok(DumpObject::not_found(name, parent));
	};
	let provider = dump.provider();
	let pointer_size = provider.pointer_size();
	let declared = field.type_id.and_then(|id| provider.type_info(id));

	if field.element.is_object_reference() {
		let target = ValueReader::field(provider, container.base, field.offset, pointer_size).read_pointer()?;
		if target == 0 {
			return Ok(DumpObject::null(name, parent));
		}
		return classify_address(dump, target);
	}

	if let Some(ty) = declared.filter(|ty| ty.is_enum()) {
		let size = scalar_width(ty.element, ty, pointer_size);
		return read_enum(&ValueReader::field(provider, container.base, field.offset, size), ty);
	}

	if field.element.is_primitive() || field.element.is_pointer() {
		let size = field.element.scalar_size(pointer_size).unwrap_or(pointer_size);
		return read_scalar(&ValueReader::field(provider, container.base, field.offset, size), field.element);
	}

	if field.element == ElementKind::Struct {
		let ty = declared.ok_or_else(|| DumpError::MissingTypeMetadata {
			context: format!("type of field {name} in {}", container.ty.name),
		})?;
		return Ok(DumpObject::ValueType(Handle {
			dump,
			address: container.base.wrapping_add(u64::from(field.offset)),
			ty,
		}));
	}

	Ok(DumpObject::not_found(name, parent))
}

/// Decode a primitive or pointer scalar from `reader`.
pub(crate) fn read_scalar<'d>(reader: &ValueReader<'_>, kind: ElementKind) -> Result<DumpObject<'d>> {
	let value = Scalar::decode(kind, &reader.read_bytes()?)?;
	let node = ScalarNode {
		value,
		address: reader.address(),
	};
	Ok(if kind.is_pointer() { DumpObject::Pointer(node) } else { DumpObject::Primitive(node) })
}

/// Decode an enum scalar from `reader` using the enum's underlying kind.
pub(crate) fn read_enum<'d>(reader: &ValueReader<'_>, ty: &'d TypeInfo) -> Result<DumpObject<'d>> {
	let value = Scalar::decode(ty.element, &reader.read_bytes()?)?;
	Ok(DumpObject::Enum(EnumNode {
		value,
		address: reader.address(),
		ty,
	}))
}

/// Payload width of a boxed value: the scalar width for primitive, pointer, and enum boxes.
pub(crate) fn boxed_width(handle: &Handle<'_>) -> usize {
	let ty = handle.ty;
	if ty.element.is_primitive() || ty.element.is_pointer() || ty.is_enum() {
		scalar_width(ty.element, ty, handle.dump.provider().pointer_size())
	} else {
		ty.size as usize
	}
}

/// Decode the payload of a boxed primitive, pointer, or enum.
pub(crate) fn read_boxed_scalar<'d>(handle: &Handle<'d>) -> Result<DumpObject<'d>> {
	let reader = ValueReader::unboxed(handle.dump.provider(), handle.address, boxed_width(handle));
	if handle.ty.is_enum() { read_enum(&reader, handle.ty) } else { read_scalar(&reader, handle.ty.element) }
}

fn scalar_width(kind: ElementKind, ty: &TypeInfo, pointer_size: usize) -> usize {
	kind.scalar_size(pointer_size).unwrap_or(ty.size as usize)
}
