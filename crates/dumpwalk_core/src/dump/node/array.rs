use tracing::trace;

use crate::dump::factory;
use crate::dump::node::{DumpObject, Handle};
use crate::dump::{ArrayShape, DumpError, ElementKind, Result, TypeInfo, ValueReader};

/// Lazy sequence of array elements in index order, dimension 0 varying fastest.
///
/// Elements are decoded one at a time; read failures surface as `UnknownError` items.
pub struct ArrayItems<'d> {
	walk: Option<ArrayWalk<'d>>,
}

struct ArrayWalk<'d> {
	parent: DumpObject<'d>,
	access: ElementAccess<'d>,
	shape: ArrayShape,
	indices: Vec<i64>,
	remaining: u64,
}

#[derive(Clone, Copy)]
enum Layout<'d> {
	Reference,
	Enum(&'d TypeInfo),
	Primitive(ElementKind),
	ValueType(&'d TypeInfo),
	Pointer(ElementKind),
	Unsupported,
}

struct ElementAccess<'d> {
	handle: Handle<'d>,
	layout: std::result::Result<(Layout<'d>, usize), String>,
}

impl<'d> ArrayItems<'d> {
	pub(crate) fn empty() -> Self {
		Self { walk: None }
	}

	pub(crate) fn new(parent: &DumpObject<'d>, handle: Handle<'d>) -> Self {
		let shape = match handle.dump.provider().array_shape(handle.address) {
			Ok(shape) => shape,
			Err(err) => {
				trace!(address = format_args!("0x{:016x}", handle.address), %err, "array shape unreadable");
				return Self::empty();
			}
		};
		if shape.rank() == 0 || shape.lower_bounds.len() != shape.rank() || shape.lengths.contains(&0) {
			return Self::empty();
		}
		let Some(total) = shape.total_len() else {
			trace!(address = format_args!("0x{:016x}", handle.address), "array length overflows");
			return Self::empty();
		};

		let mut indices: Vec<i64> = shape.lower_bounds.iter().map(|bound| i64::from(*bound)).collect();
		indices[0] -= 1;
		Self {
			walk: Some(ArrayWalk {
				parent: parent.clone(),
				access: ElementAccess::new(handle),
				remaining: total,
				shape,
				indices,
			}),
		}
	}

	/// Next element paired with its formatted index tuple.
	pub(crate) fn next_labeled(&mut self) -> Option<(String, DumpObject<'d>)> {
		let walk = self.walk.as_mut()?;
		if !walk.advance() {
			self.walk = None;
			return None;
		}
		walk.remaining = walk.remaining.saturating_sub(1);
		let label = format_indices(&walk.indices);
		let node = walk.access.element(&walk.parent, &walk.shape, &walk.indices);
		Some((label, node))
	}

	/// Number of elements not yet produced.
	pub fn remaining(&self) -> u64 {
		self.walk.as_ref().map_or(0, |walk| walk.remaining)
	}
}

impl<'d> Iterator for ArrayItems<'d> {
	type Item = DumpObject<'d>;

	fn next(&mut self) -> Option<Self::Item> {
		self.next_labeled().map(|(_, node)| node)
	}

	fn size_hint(&self) -> (usize, Option<usize>) {
		let remaining = usize::try_from(self.remaining()).unwrap_or(usize::MAX);
		(remaining, Some(remaining))
	}
}

impl ArrayWalk<'_> {
	/// Step to the next index tuple, carrying into higher dimensions.
	fn advance(&mut self) -> bool {
		for dim in 0..self.indices.len() {
			self.indices[dim] += 1;
			if self.indices[dim] <= self.shape.upper_bound(dim) {
				return true;
			}
			self.indices[dim] = i64::from(self.shape.lower_bounds[dim]);
		}
		false
	}
}

impl<'d> ElementAccess<'d> {
	fn new(handle: Handle<'d>) -> Self {
		Self {
			handle,
			layout: element_layout(handle).map_err(|err| err.to_string()),
		}
	}

	fn element(&self, parent: &DumpObject<'d>, shape: &ArrayShape, indices: &[i64]) -> DumpObject<'d> {
		let label = format_indices(indices);
		match self.try_element(parent, shape, indices, &label) {
			Ok(node) => node,
			Err(err) => DumpObject::unknown_error(err.to_string(), label, parent),
		}
	}

	fn try_element(&self, parent: &DumpObject<'d>, shape: &ArrayShape, indices: &[i64], label: &str) -> Result<DumpObject<'d>> {
		let (layout, size) = match &self.layout {
			Ok(layout) => *layout,
			Err(message) => return Ok(DumpObject::unknown_error(message.clone(), label, parent)),
		};
		if let Layout::Unsupported = layout {
			return Ok(DumpObject::not_found(label, parent));
		}

		let index: Vec<i32> = indices
			.iter()
			.map(|value| i32::try_from(*value).map_err(|_| DumpError::IndexOutOfBounds { index: Vec::new() }))
			.collect::<Result<_>>()?;
		let linear = shape.linear_index(&index)?;
		let dump = self.handle.dump;
		let reader = ValueReader::array_element(dump.provider(), shape.data, linear, size);

		match layout {
			Layout::Reference => {
				let target = reader.read_pointer()?;
				if target == 0 {
					return Ok(DumpObject::null(label, parent));
				}
				factory::classify_address(dump, target)
			}
			Layout::Enum(ty) => factory::read_enum(&reader, ty),
			Layout::Primitive(kind) | Layout::Pointer(kind) => factory::read_scalar(&reader, kind),
			Layout::ValueType(ty) => Ok(DumpObject::ValueType(Handle {
				dump,
				address: reader.address(),
				ty,
			})),
			Layout::Unsupported => Ok(DumpObject::not_found(label, parent)),
		}
	}
}

fn element_layout<'d>(handle: Handle<'d>) -> Result<(Layout<'d>, usize)> {
	let component = handle.ty.component.ok_or_else(|| DumpError::MissingTypeMetadata {
		context: format!("component type of {}", handle.ty.name),
	})?;
	let ty = handle.dump.type_info(component)?;
	let pointer_size = handle.dump.provider().pointer_size();

	let scalar = |kind: ElementKind| kind.scalar_size(pointer_size).unwrap_or(ty.size as usize);
	let layout = if ty.element.is_object_reference() {
		(Layout::Reference, pointer_size)
	} else if ty.is_enum() {
		(Layout::Enum(ty), scalar(ty.element))
	} else if ty.is_primitive() {
		(Layout::Primitive(ty.element), scalar(ty.element))
	} else if ty.element == ElementKind::Struct {
		(Layout::ValueType(ty), ty.size as usize)
	} else if ty.element.is_pointer() {
		(Layout::Pointer(ty.element), pointer_size)
	} else {
		(Layout::Unsupported, 0)
	};
	Ok(layout)
}

/// Select one element by zero-based position along each dimension.
pub(crate) fn item_at<'d>(parent: &DumpObject<'d>, handle: Handle<'d>, position: &[usize]) -> DumpObject<'d> {
	let label = format_positions(position);
	let shape = match handle.dump.provider().array_shape(handle.address) {
		Ok(shape) => shape,
		Err(err) => return DumpObject::unknown_error(err.to_string(), label, parent),
	};
	if position.len() != shape.rank() || shape.lower_bounds.len() != shape.rank() {
		return DumpObject::not_found(label, parent);
	}

	let mut indices = Vec::with_capacity(position.len());
	for (dim, pos) in position.iter().enumerate() {
		if *pos as u64 >= u64::from(shape.lengths[dim]) {
			return DumpObject::not_found(label, parent);
		}
		indices.push(i64::from(shape.lower_bounds[dim]) + *pos as i64);
	}
	ElementAccess::new(handle).element(parent, &shape, &indices)
}

/// Format an index tuple as `[a, b]`.
pub(crate) fn format_indices(indices: &[i64]) -> String {
	let parts: Vec<String> = indices.iter().map(i64::to_string).collect();
	format!("[{}]", parts.join(", "))
}

pub(crate) fn format_positions(position: &[usize]) -> String {
	let parts: Vec<String> = position.iter().map(usize::to_string).collect();
	format!("[{}]", parts.join(", "))
}

#[cfg(test)]
mod tests {
	use super::{format_indices, format_positions};

	#[test]
	fn indices_format_with_comma_space() {
		assert_eq!(format_indices(&[3]), "[3]");
		assert_eq!(format_indices(&[-1, 2]), "[-1, 2]");
		assert_eq!(format_positions(&[0, 1, 2]), "[0, 1, 2]");
	}
}
