use std::collections::HashMap;

use crate::dump::image::{HeapImage, Segment};
use crate::dump::{Address, ArrayShape, DumpError, ElementKind, EnumValue, FieldDef, RawValue, Result, TypeId, TypeInfo, raw_bytes};

const DEFAULT_BASE: Address = 0x0200_0000;
const TYPE_ID_BASE: u64 = 0x7ffd_1000;
const TYPE_ID_STRIDE: u64 = 0x40;
/// Type word written by [`HeapImageBuilder::add_corrupt_entry`].
pub const CORRUPT_TYPE_WORD: u64 = 0xdead_beef_dead_beef;

/// Declared type of one field passed to the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
	/// Primitive or pointer stored inline.
	Scalar(ElementKind),
	/// Untyped object reference.
	Object,
	/// Field of a previously defined type; references, enums, and inline structs follow from it.
	Of(TypeId),
}

/// Incremental writer for synthetic heap images.
///
/// Types get auto-assigned ids and natural field layouts; objects are allocated contiguously in a
/// single memory segment.
#[derive(Debug, Clone)]
pub struct HeapImageBuilder {
	pointer_size: usize,
	types: Vec<TypeInfo>,
	type_index: HashMap<TypeId, usize>,
	names: HashMap<String, TypeId>,
	base: Address,
	memory: Vec<u8>,
	objects: Vec<Address>,
}

impl Default for HeapImageBuilder {
	fn default() -> Self {
		Self::new(8)
	}
}

impl HeapImageBuilder {
	/// Start an empty image for a process with `pointer_size`-byte words.
	pub fn new(pointer_size: usize) -> Self {
		Self {
			pointer_size,
			types: Vec::new(),
			type_index: HashMap::new(),
			names: HashMap::new(),
			base: DEFAULT_BASE,
			memory: Vec::new(),
			objects: Vec::new(),
		}
	}

	/// Word width of the image.
	pub fn pointer_size(&self) -> usize {
		self.pointer_size
	}

	/// Metadata of a defined type.
	pub fn type_info(&self, id: TypeId) -> Option<&TypeInfo> {
		self.type_index.get(&id).map(|idx| &self.types[*idx])
	}

	/// Id of a defined type by exact name.
	pub fn type_id(&self, name: &str) -> Option<TypeId> {
		self.names.get(name).copied()
	}

	/// Define the runtime string type, once.
	pub fn string_type(&mut self) -> TypeId {
		self.named_or_insert("System.String", |id| TypeInfo {
			id,
			name: "System.String".to_owned(),
			element: ElementKind::String,
			size: 0,
			fields: Vec::new(),
			component: None,
			rank: 0,
			enum_values: None,
		})
	}

	/// Define the runtime type for a primitive or pointer kind, once.
	pub fn primitive_type(&mut self, kind: ElementKind) -> TypeId {
		let name = kind.type_name();
		let size = kind.scalar_size(self.pointer_size).unwrap_or(0) as u32;
		self.named_or_insert(name, |id| TypeInfo {
			id,
			name: name.to_owned(),
			element: kind,
			size,
			fields: Vec::new(),
			component: None,
			rank: 0,
			enum_values: None,
		})
	}

	/// Define a reference type with fields laid out in declaration order.
	pub fn class_type(&mut self, name: &str, fields: &[(&str, FieldType)]) -> Result<TypeId> {
		let (defs, size) = self.layout(fields)?;
		let size = align_up(size, self.pointer_size);
		Ok(self.insert_type(|id| TypeInfo {
			id,
			name: name.to_owned(),
			element: ElementKind::Class,
			size: size as u32,
			fields: defs,
			component: None,
			rank: 0,
			enum_values: None,
		}))
	}

	/// Define an inline value type with fields laid out in declaration order.
	pub fn struct_type(&mut self, name: &str, fields: &[(&str, FieldType)]) -> Result<TypeId> {
		let (defs, size) = self.layout(fields)?;
		Ok(self.insert_type(|id| TypeInfo {
			id,
			name: name.to_owned(),
			element: ElementKind::Struct,
			size: size.max(1) as u32,
			fields: defs,
			component: None,
			rank: 0,
			enum_values: None,
		}))
	}

	/// Define an enum over an integer `underlying` kind with `(name, value)` members.
	pub fn enum_type(&mut self, name: &str, underlying: ElementKind, values: &[(&str, i64)]) -> TypeId {
		let size = underlying.scalar_size(self.pointer_size).unwrap_or(4) as u32;
		self.insert_type(|id| TypeInfo {
			id,
			name: name.to_owned(),
			element: underlying,
			size,
			fields: Vec::new(),
			component: None,
			rank: 0,
			enum_values: Some(
				values
					.iter()
					.map(|(member, value)| EnumValue {
						name: (*member).to_owned(),
						value: *value as u64,
					})
					.collect(),
			),
		})
	}

	/// Define a single-dimension zero-based array of `component`.
	pub fn array_type(&mut self, component: TypeId) -> Result<TypeId> {
		let component_name = self.require_type(component)?.name.clone();
		let name = format!("{component_name}[]");
		Ok(self.named_or_insert(&name, |id| TypeInfo {
			id,
			name: name.clone(),
			element: ElementKind::SzArray,
			size: 0,
			fields: Vec::new(),
			component: Some(component),
			rank: 1,
			enum_values: None,
		}))
	}

	/// Define a multi-dimensional array of `component` with explicit bounds.
	pub fn multi_array_type(&mut self, component: TypeId, rank: u32) -> Result<TypeId> {
		let component_name = self.require_type(component)?.name.clone();
		let commas = if rank <= 1 { "*".to_owned() } else { ",".repeat(rank as usize - 1) };
		let name = format!("{component_name}[{commas}]");
		Ok(self.named_or_insert(&name, |id| TypeInfo {
			id,
			name: name.clone(),
			element: ElementKind::Array,
			size: 0,
			fields: Vec::new(),
			component: Some(component),
			rank: rank.max(1),
			enum_values: None,
		}))
	}

	/// Allocate a zeroed instance of a reference type.
	pub fn alloc_object(&mut self, ty: TypeId) -> Result<Address> {
		let size = self.require_type(ty)?.size as usize;
		let address = self.alloc(self.pointer_size + size);
		self.write_word(address, ty.0)?;
		self.objects.push(address);
		Ok(address)
	}

	/// Allocate a string object holding `text`.
	pub fn alloc_string(&mut self, text: &str) -> Result<Address> {
		let ty = self.string_type();
		let units: Vec<u16> = text.encode_utf16().collect();
		let address = self.alloc(self.pointer_size + 4 + units.len() * 2);
		self.write_word(address, ty.0)?;
		let data = self.object_data(address);
		self.write(data, &(units.len() as u32).to_le_bytes())?;
		let bytes: Vec<u8> = units.iter().flat_map(|unit| unit.to_le_bytes()).collect();
		self.write(data + 4, &bytes)?;
		self.objects.push(address);
		Ok(address)
	}

	/// Allocate a zeroed single-dimension array with `len` elements.
	pub fn alloc_array(&mut self, ty: TypeId, len: u32) -> Result<Address> {
		let info = self.require_type(ty)?;
		if info.element != ElementKind::SzArray {
			return Err(DumpError::MalformedArray { address: 0 });
		}
		let element = self.element_size(ty)?;
		let address = self.alloc(self.pointer_size * 2 + element * len as usize);
		self.write_word(address, ty.0)?;
		self.write(self.object_data(address), &len.to_le_bytes())?;
		self.objects.push(address);
		Ok(address)
	}

	/// Allocate a zeroed multi-dimensional array with per-dimension lengths and lower bounds.
	pub fn alloc_multi_array(&mut self, ty: TypeId, lengths: &[u32], lower_bounds: &[i32]) -> Result<Address> {
		let info = self.require_type(ty)?;
		if info.element != ElementKind::Array || info.rank as usize != lengths.len() || lengths.len() != lower_bounds.len() {
			return Err(DumpError::MalformedArray { address: 0 });
		}
		let total: u64 = lengths.iter().map(|len| u64::from(*len)).product();
		let element = self.element_size(ty)?;
		let rank = lengths.len();
		let address = self.alloc(self.pointer_size * 2 + rank * 8 + element * total as usize);
		self.write_word(address, ty.0)?;

		let data = self.object_data(address);
		self.write(data, &(total as u32).to_le_bytes())?;
		let dims = data + self.pointer_size as u64;
		for (dim, len) in lengths.iter().enumerate() {
			self.write(dims + 4 * dim as u64, &len.to_le_bytes())?;
		}
		let bounds = dims + 4 * rank as u64;
		for (dim, bound) in lower_bounds.iter().enumerate() {
			self.write(bounds + 4 * dim as u64, &bound.to_le_bytes())?;
		}
		self.objects.push(address);
		Ok(address)
	}

	/// Allocate a boxed instance of value type `ty` holding `payload`.
	pub fn alloc_boxed(&mut self, ty: TypeId, payload: &[u8]) -> Result<Address> {
		let size = self.require_type(ty)?.size as usize;
		let address = self.alloc(self.pointer_size + size.max(payload.len()));
		self.write_word(address, ty.0)?;
		self.write(self.object_data(address), payload)?;
		self.objects.push(address);
		Ok(address)
	}

	/// Add a heap entry whose type word does not resolve.
	pub fn add_corrupt_entry(&mut self) -> Result<Address> {
		let address = self.alloc(self.pointer_size * 2);
		self.write_word(address, CORRUPT_TYPE_WORD)?;
		self.objects.push(address);
		Ok(address)
	}

	/// Write a typed value into a field of the heap object at `object`.
	pub fn set_field<T: RawValue>(&mut self, object: Address, name: &str, value: T) -> Result<()> {
		self.set_field_bytes(object, name, &raw_bytes(value))
	}

	/// Write raw bytes into a field of the heap object at `object`.
	pub fn set_field_bytes(&mut self, object: Address, name: &str, bytes: &[u8]) -> Result<()> {
		let address = self.field_address(object, name)?;
		self.write(address, bytes)
	}

	/// Store a reference to `target` (0 for null) in a field of the heap object at `object`.
	pub fn set_reference(&mut self, object: Address, name: &str, target: Address) -> Result<()> {
		let address = self.field_address(object, name)?;
		self.write_word(address, target)
	}

	/// Address of a field's storage inside the heap object at `object`.
	pub fn field_address(&self, object: Address, name: &str) -> Result<Address> {
		let ty = self.object_type(object)?;
		self.value_field_address(self.object_data(object), ty, name)
	}

	/// Address of a field's storage inside an inline value of type `ty` at `value`.
	pub fn value_field_address(&self, value: Address, ty: TypeId, name: &str) -> Result<Address> {
		let info = self.require_type(ty)?;
		let field = info.field_by_name(name).ok_or_else(|| DumpError::NoSuchField {
			type_name: info.name.clone(),
			field: name.to_owned(),
		})?;
		Ok(value + u64::from(field.offset))
	}

	/// Write a typed value into a field of an inline value.
	pub fn set_value_field<T: RawValue>(&mut self, value: Address, ty: TypeId, name: &str, field_value: T) -> Result<()> {
		let address = self.value_field_address(value, ty, name)?;
		self.write(address, &raw_bytes(field_value))
	}

	/// Address of the element at `index` (actual indices, honoring lower bounds).
	pub fn element_address(&self, array: Address, index: &[i32]) -> Result<Address> {
		let ty = self.object_type(array)?;
		let info = self.require_type(ty)?;
		let data = self.object_data(array);
		let element = self.element_size(ty)? as u64;

		if info.element == ElementKind::SzArray {
			let len = u32::from_le_bytes(self.read4(data)?);
			let [idx] = index else {
				return Err(DumpError::IndexOutOfBounds { index: index.to_vec() });
			};
			if *idx < 0 || *idx as u32 >= len {
				return Err(DumpError::IndexOutOfBounds { index: index.to_vec() });
			}
			return Ok(data + self.pointer_size as u64 + element * *idx as u64);
		}

		let rank = info.rank as usize;
		let dims = data + self.pointer_size as u64;
		let mut lengths = Vec::with_capacity(rank);
		let mut lower_bounds = Vec::with_capacity(rank);
		for dim in 0..rank {
			lengths.push(u32::from_le_bytes(self.read4(dims + 4 * dim as u64)?));
			lower_bounds.push(i32::from_le_bytes(self.read4(dims + 4 * (rank + dim) as u64)?));
		}
		let shape = ArrayShape {
			data: dims + 8 * rank as u64,
			lengths,
			lower_bounds,
		};
		let linear = shape.linear_index(index)?;
		Ok(shape.data + element * linear)
	}

	/// Write a typed value into an array element.
	pub fn set_element<T: RawValue>(&mut self, array: Address, index: &[i32], value: T) -> Result<()> {
		let address = self.element_address(array, index)?;
		self.write(address, &raw_bytes(value))
	}

	/// Store a reference to `target` in an array element.
	pub fn set_element_reference(&mut self, array: Address, index: &[i32], target: Address) -> Result<()> {
		let address = self.element_address(array, index)?;
		self.write_word(address, target)
	}

	/// Overwrite raw bytes at an allocated address.
	pub fn write(&mut self, address: Address, bytes: &[u8]) -> Result<()> {
		let start = address
			.checked_sub(self.base)
			.map(|offset| offset as usize)
			.filter(|offset| offset + bytes.len() <= self.memory.len())
			.ok_or(DumpError::UnmappedRead { address, len: bytes.len() })?;
		self.memory[start..start + bytes.len()].copy_from_slice(bytes);
		Ok(())
	}

	/// Store one native-width word.
	pub fn write_word(&mut self, address: Address, value: u64) -> Result<()> {
		let bytes = value.to_le_bytes();
		self.write(address, &bytes[..self.pointer_size])
	}

	/// Finish the image.
	pub fn build(self) -> Result<HeapImage> {
		let segments = if self.memory.is_empty() {
			Vec::new()
		} else {
			vec![Segment {
				start: self.base,
				bytes: self.memory,
			}]
		};
		HeapImage::from_parts(self.pointer_size, self.types, segments, self.objects)
	}

	fn layout(&self, fields: &[(&str, FieldType)]) -> Result<(Vec<FieldDef>, usize)> {
		let mut offset = 0_usize;
		let mut defs = Vec::with_capacity(fields.len());
		for (name, field_type) in fields {
			let (element, type_id, size) = self.resolve_field_type(*field_type)?;
			let align = size.clamp(1, self.pointer_size).next_power_of_two();
			offset = align_up(offset, align);
			defs.push(FieldDef {
				name: (*name).to_owned(),
				element,
				type_id,
				offset: offset as u32,
			});
			offset += size;
		}
		Ok((defs, offset))
	}

	fn resolve_field_type(&self, field_type: FieldType) -> Result<(ElementKind, Option<TypeId>, usize)> {
		match field_type {
			FieldType::Scalar(kind) => {
				let size = kind.scalar_size(self.pointer_size).ok_or(DumpError::NotScalar { kind })?;
				Ok((kind, None, size))
			}
			FieldType::Object => Ok((ElementKind::Object, None, self.pointer_size)),
			FieldType::Of(id) => {
				let info = self.require_type(id)?;
				if info.element == ElementKind::Struct {
					return Ok((ElementKind::Struct, Some(id), info.size as usize));
				}
				let size = info.element.scalar_size(self.pointer_size).unwrap_or(self.pointer_size);
				Ok((info.element, Some(id), size))
			}
		}
	}

	fn element_size(&self, array_ty: TypeId) -> Result<usize> {
		let info = self.require_type(array_ty)?;
		let component = info.component.ok_or_else(|| DumpError::MissingTypeMetadata {
			context: format!("component type of {}", info.name),
		})?;
		let (_, _, size) = self.resolve_field_type(FieldType::Of(component))?;
		Ok(size)
	}

	fn require_type(&self, id: TypeId) -> Result<&TypeInfo> {
		self.type_info(id).ok_or_else(|| DumpError::MissingTypeMetadata { context: format!("type {id}") })
	}

	fn object_type(&self, object: Address) -> Result<TypeId> {
		let mut word = [0_u8; 8];
		let start = object
			.checked_sub(self.base)
			.map(|offset| offset as usize)
			.filter(|offset| offset + self.pointer_size <= self.memory.len())
			.ok_or(DumpError::UnmappedRead {
				address: object,
				len: self.pointer_size,
			})?;
		word[..self.pointer_size].copy_from_slice(&self.memory[start..start + self.pointer_size]);
		Ok(TypeId(u64::from_le_bytes(word)))
	}

	fn read4(&self, address: Address) -> Result<[u8; 4]> {
		let start = address
			.checked_sub(self.base)
			.map(|offset| offset as usize)
			.filter(|offset| offset + 4 <= self.memory.len())
			.ok_or(DumpError::UnmappedRead { address, len: 4 })?;
		let mut out = [0_u8; 4];
		out.copy_from_slice(&self.memory[start..start + 4]);
		Ok(out)
	}

	fn object_data(&self, object: Address) -> Address {
		object + self.pointer_size as u64
	}

	fn alloc(&mut self, size: usize) -> Address {
		let offset = align_up(self.memory.len(), self.pointer_size);
		let size = align_up(size.max(self.pointer_size * 2), self.pointer_size);
		self.memory.resize(offset + size, 0);
		self.base + offset as u64
	}

	fn named_or_insert(&mut self, name: &str, make: impl FnOnce(TypeId) -> TypeInfo) -> TypeId {
		if let Some(id) = self.names.get(name) {
			return *id;
		}
		self.insert_type(make)
	}

	fn insert_type(&mut self, make: impl FnOnce(TypeId) -> TypeInfo) -> TypeId {
		let id = TypeId(TYPE_ID_BASE + TYPE_ID_STRIDE * self.types.len() as u64);
		let info = make(id);
		self.names.insert(info.name.clone(), id);
		self.type_index.insert(id, self.types.len());
		self.types.push(info);
		id
	}
}

fn align_up(value: usize, align: usize) -> usize {
	value.div_ceil(align) * align
}
