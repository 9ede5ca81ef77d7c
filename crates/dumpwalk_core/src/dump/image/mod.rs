//! JSON heap image provider.
//!
//! A heap image is a self-contained snapshot: type metadata, raw memory segments, and the list of
//! heap object addresses. Memory follows a CLR-like little-endian layout:
//!
//! - object: first word = type id; instance data starts one word later
//! - string: data = `u32` length, then UTF-16 code units
//! - array: data = `u32` total length padded to one word; multi-dimensional arrays continue with
//!   `rank` x `u32` lengths and `rank` x `i32` lower bounds; elements follow in row-major order
//! - boxed value: data = payload of `TypeInfo::size` bytes

mod builder;
mod compression;

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

pub use builder::{FieldType, HeapImageBuilder};
pub use compression::{Compression, MAX_DECOMPRESSED_BYTES, ZSTD_MAGIC};

use crate::dump::{Address, ArrayShape, DumpError, ElementKind, HeapEntry, HeapProvider, Result, TypeId, TypeInfo};

/// Options controlling heap image loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenOptions {
	/// Maximum decompressed document size accepted from zstd images.
	pub max_decompressed_bytes: usize,
}

impl Default for OpenOptions {
	fn default() -> Self {
		Self {
			max_decompressed_bytes: MAX_DECOMPRESSED_BYTES,
		}
	}
}

/// One contiguous captured memory range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
	/// First address covered.
	pub start: Address,
	/// Captured bytes, hex-encoded in the document.
	#[serde(with = "hex_bytes")]
	pub bytes: Vec<u8>,
}

impl Segment {
	/// One past the last covered address.
	pub fn end(&self) -> Address {
		self.start.saturating_add(self.bytes.len() as u64)
	}
}

#[derive(Debug, Serialize, Deserialize)]
struct ImageDocument {
	pointer_size: usize,
	types: Vec<TypeInfo>,
	segments: Vec<Segment>,
	objects: Vec<Address>,
}

/// In-memory heap snapshot loaded from a JSON heap image.
#[derive(Debug, Clone)]
pub struct HeapImage {
	pointer_size: usize,
	types: Vec<TypeInfo>,
	type_index: HashMap<TypeId, usize>,
	segments: Vec<Segment>,
	objects: Vec<Address>,
	compression: Compression,
}

impl HeapImage {
	/// Read and parse a heap image file.
	pub fn open(path: impl AsRef<Path>) -> Result<Self> {
		Self::open_with(path, &OpenOptions::default())
	}

	/// Read and parse a heap image file with explicit options.
	pub fn open_with(path: impl AsRef<Path>, options: &OpenOptions) -> Result<Self> {
		let raw = std::fs::read(path)?;
		Self::from_bytes(raw, options)
	}

	/// Parse raw file bytes, detecting compression.
	pub fn from_bytes(raw: Vec<u8>, options: &OpenOptions) -> Result<Self> {
		let (compression, document) = compression::decode_bytes(raw, options.max_decompressed_bytes)?;
		let mut image = Self::from_json_slice(&document)?;
		image.compression = compression;
		Ok(image)
	}

	/// Parse an uncompressed JSON document.
	pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
		let document: ImageDocument = serde_json::from_slice(bytes)?;
		Self::from_parts(document.pointer_size, document.types, document.segments, document.objects)
	}

	/// Validate and index snapshot parts.
	pub fn from_parts(pointer_size: usize, types: Vec<TypeInfo>, mut segments: Vec<Segment>, objects: Vec<Address>) -> Result<Self> {
		if pointer_size != 4 && pointer_size != 8 {
			return Err(DumpError::UnsupportedPointerSize { size: pointer_size });
		}

		let mut type_index = HashMap::with_capacity(types.len());
		for (idx, ty) in types.iter().enumerate() {
			if type_index.insert(ty.id, idx).is_some() {
				return Err(DumpError::DuplicateTypeId { id: ty.id.0 });
			}
		}

		segments.sort_by_key(|segment| segment.start);
		for pair in segments.windows(2) {
			if pair[1].start < pair[0].end() {
				return Err(DumpError::OverlappingSegments { address: pair[1].start });
			}
		}

		Ok(Self {
			pointer_size,
			types,
			type_index,
			segments,
			objects,
			compression: Compression::None,
		})
	}

	/// Serialize as an uncompressed JSON document.
	pub fn to_json_vec(&self) -> Result<Vec<u8>> {
		let document = ImageDocument {
			pointer_size: self.pointer_size,
			types: self.types.clone(),
			segments: self.segments.clone(),
			objects: self.objects.clone(),
		};
		Ok(serde_json::to_vec(&document)?)
	}

	/// Write the image to `path` with the requested compression.
	pub fn write(&self, path: impl AsRef<Path>, mode: Compression) -> Result<()> {
		let bytes = compression::encode_bytes(self.to_json_vec()?, mode)?;
		std::fs::write(path, bytes)?;
		Ok(())
	}

	/// Compression detected when the image was loaded.
	pub fn compression(&self) -> Compression {
		self.compression
	}

	/// All type metadata records in document order.
	pub fn types(&self) -> &[TypeInfo] {
		&self.types
	}

	/// Number of type metadata records.
	pub fn type_count(&self) -> usize {
		self.types.len()
	}

	/// Captured memory segments sorted by start address.
	pub fn segments(&self) -> &[Segment] {
		&self.segments
	}

	/// Number of heap object entries, valid or not.
	pub fn object_count(&self) -> usize {
		self.objects.len()
	}

	/// Number of heap object entries whose type word does not resolve.
	pub fn invalid_count(&self) -> usize {
		self.objects.iter().filter(|address| self.object_type(**address).is_err()).count()
	}

	fn segment_for(&self, address: Address) -> Option<&Segment> {
		let idx = self.segments.partition_point(|segment| segment.start <= address);
		if idx == 0 {
			return None;
		}
		let segment = &self.segments[idx - 1];
		(address < segment.end()).then_some(segment)
	}

	/// Whether `len` bytes starting at `address` lie inside one segment.
	fn is_mapped(&self, address: Address, len: usize) -> bool {
		self.segment_for(address).is_some_and(|segment| {
			let start = (address - segment.start) as usize;
			start.checked_add(len).is_some_and(|end| end <= segment.bytes.len())
		})
	}

	fn read_u32(&self, address: Address) -> Result<u32> {
		let mut buf = [0_u8; 4];
		self.read_memory(address, &mut buf)?;
		Ok(u32::from_le_bytes(buf))
	}

	fn read_i32(&self, address: Address) -> Result<i32> {
		let mut buf = [0_u8; 4];
		self.read_memory(address, &mut buf)?;
		Ok(i32::from_le_bytes(buf))
	}

	fn object_type_info(&self, address: Address) -> Result<&TypeInfo> {
		let type_id = self.object_type(address)?;
		self.type_info(type_id).ok_or(DumpError::UnknownType { type_id, address })
	}
}

impl HeapProvider for HeapImage {
	fn pointer_size(&self) -> usize {
		self.pointer_size
	}

	fn type_info(&self, id: TypeId) -> Option<&TypeInfo> {
		self.type_index.get(&id).map(|idx| &self.types[*idx])
	}

	fn object_type(&self, address: Address) -> Result<TypeId> {
		let type_id = TypeId(self.read_pointer(address)?);
		if !self.type_index.contains_key(&type_id) {
			return Err(DumpError::UnknownType { type_id, address });
		}
		Ok(type_id)
	}

	fn read_memory(&self, address: Address, buf: &mut [u8]) -> Result<()> {
		let unmapped = DumpError::UnmappedRead { address, len: buf.len() };
		let Some(segment) = self.segment_for(address) else {
			return Err(unmapped);
		};
		let start = (address - segment.start) as usize;
		let Some(bytes) = start.checked_add(buf.len()).and_then(|end| segment.bytes.get(start..end)) else {
			return Err(unmapped);
		};
		buf.copy_from_slice(bytes);
		Ok(())
	}

	fn heap_objects(&self) -> Box<dyn Iterator<Item = HeapEntry> + '_> {
		Box::new(self.objects.iter().map(|address| HeapEntry {
			address: *address,
			valid: self.object_type(*address).is_ok(),
		}))
	}

	fn array_shape(&self, address: Address) -> Result<ArrayShape> {
		let ty = self.object_type_info(address)?;
		if !ty.is_array() {
			return Err(DumpError::NotAnArray { address });
		}

		let malformed = || DumpError::MalformedArray { address };
		let header = self.object_data(address);
		let total = self.read_u32(header)?;
		let mut data = header.checked_add(self.pointer_size as u64).ok_or_else(malformed)?;

		if ty.element == ElementKind::SzArray {
			return Ok(ArrayShape {
				data,
				lengths: vec![total],
				lower_bounds: vec![0],
			});
		}

		let rank = ty.rank as usize;
		if rank == 0 {
			return Err(DumpError::MalformedArray { address });
		}
		let offset = |base: Address, words: usize| base.checked_add(4 * words as u64).ok_or_else(malformed);
		let mut lengths = Vec::with_capacity(rank);
		for dim in 0..rank {
			lengths.push(self.read_u32(offset(data, dim)?)?);
		}
		let bounds = offset(data, rank)?;
		let mut lower_bounds = Vec::with_capacity(rank);
		for dim in 0..rank {
			lower_bounds.push(self.read_i32(offset(bounds, dim)?)?);
		}
		data = offset(data, 2 * rank)?;

		let shape = ArrayShape { data, lengths, lower_bounds };
		if shape.total_len() != Some(u64::from(total)) {
			return Err(malformed());
		}
		Ok(shape)
	}

	fn read_string(&self, address: Address, max_len: usize) -> Result<String> {
		let ty = self.object_type_info(address)?;
		if !ty.is_string() {
			return Err(DumpError::NotAString { address });
		}

		let data = self.object_data(address);
		let len = (self.read_u32(data)? as usize).min(max_len);
		let chars = data.checked_add(4).ok_or(DumpError::UnmappedRead { address: data, len: 4 })?;
		let byte_len = len.saturating_mul(2);
		if !self.is_mapped(chars, byte_len) {
			return Err(DumpError::UnmappedRead { address: chars, len: byte_len });
		}
		let mut bytes = vec![0_u8; byte_len];
		self.read_memory(chars, &mut bytes)?;
		let units: Vec<u16> = bytes.chunks_exact(2).map(|pair| u16::from_le_bytes([pair[0], pair[1]])).collect();
		Ok(String::from_utf16_lossy(&units))
	}
}

mod hex_bytes {
	use serde::{Deserialize, Deserializer, Serializer};

	pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&hex::encode(bytes))
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
		let text = String::deserialize(deserializer)?;
		hex::decode(text).map_err(serde::de::Error::custom)
	}
}

#[cfg(test)]
mod tests;
