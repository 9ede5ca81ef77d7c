use crate::dump::{Address, DumpError, HeapProvider, RawValue, Result};

/// Physical storage a [`ValueReader`] is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
	/// Field stored inside an object or inline value.
	Field,
	/// Element stored inside an array.
	ArrayElement,
	/// Payload of a boxed value.
	Boxed,
}

/// Raw byte reader scoped to one value's storage in the snapshot.
///
/// Formatters receive one of these and decode whatever layout their type has.
#[derive(Clone, Copy)]
pub struct ValueReader<'d> {
	provider: &'d dyn HeapProvider,
	address: Address,
	len: usize,
	storage: Storage,
}

impl<'d> ValueReader<'d> {
	/// Reader over a field of `len` bytes at `field_base + offset`.
	pub fn field(provider: &'d dyn HeapProvider, field_base: Address, offset: u32, len: usize) -> Self {
		Self {
			provider,
			address: field_base.wrapping_add(u64::from(offset)),
			len,
			storage: Storage::Field,
		}
	}

	/// Reader over the array element at `data + linear * element_size`.
	pub fn array_element(provider: &'d dyn HeapProvider, data: Address, linear: u64, element_size: usize) -> Self {
		Self {
			provider,
			address: data.wrapping_add(linear.wrapping_mul(element_size as u64)),
			len: element_size,
			storage: Storage::ArrayElement,
		}
	}

	/// Reader over the payload of the boxed object at `object`.
	pub fn unboxed(provider: &'d dyn HeapProvider, object: Address, payload_len: usize) -> Self {
		Self {
			provider,
			address: provider.object_data(object),
			len: payload_len,
			storage: Storage::Boxed,
		}
	}

	/// First byte of the scoped storage.
	pub fn address(&self) -> Address {
		self.address
	}

	/// Size of the scoped storage in bytes.
	pub fn len(&self) -> usize {
		self.len
	}

	/// Whether the scoped storage is zero-sized.
	pub fn is_empty(&self) -> bool {
		self.len == 0
	}

	/// Storage kind the reader was created for.
	pub fn storage(&self) -> Storage {
		self.storage
	}

	/// Read `T` from the start of the storage.
	pub fn read<T: RawValue>(&self) -> Result<T> {
		self.read_at(0)
	}

	/// Read `T` at `offset` bytes into the storage.
	pub fn read_at<T: RawValue>(&self, offset: usize) -> Result<T> {
		let end = offset.checked_add(T::SIZE).unwrap_or(usize::MAX);
		if end > self.len {
			return Err(DumpError::ReadTooWide {
				address: self.address,
				want: end,
				have: self.len,
			});
		}

		let mut buf = vec![0_u8; T::SIZE];
		self.provider.read_memory(self.address.wrapping_add(offset as u64), &mut buf)?;
		Ok(T::from_raw(&buf))
	}

	/// Read the whole storage.
	pub fn read_bytes(&self) -> Result<Vec<u8>> {
		let mut buf = vec![0_u8; self.len];
		self.provider.read_memory(self.address, &mut buf)?;
		Ok(buf)
	}

	/// Read a native-width word at the start of the storage.
	pub fn read_pointer(&self) -> Result<Address> {
		let size = self.provider.pointer_size();
		if size > self.len {
			return Err(DumpError::ReadTooWide {
				address: self.address,
				want: size,
				have: self.len,
			});
		}
		self.provider.read_pointer(self.address)
	}
}

impl std::fmt::Debug for ValueReader<'_> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ValueReader")
			.field("address", &format_args!("0x{:016x}", self.address))
			.field("len", &self.len)
			.field("storage", &self.storage)
			.finish()
	}
}
