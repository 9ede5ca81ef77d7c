/// Plain-old-data type that can be reinterpreted from snapshot bytes.
///
/// Snapshot memory is little-endian. `from_raw` receives exactly `SIZE` bytes.
pub trait RawValue: Copy + 'static {
	/// Storage width in bytes.
	const SIZE: usize;

	/// Reinterpret `SIZE` little-endian bytes.
	fn from_raw(bytes: &[u8]) -> Self;

	/// Write the value as `SIZE` little-endian bytes.
	fn write_raw(&self, out: &mut [u8]);

	/// Short name used in diagnostics.
	fn type_label() -> &'static str {
		std::any::type_name::<Self>()
	}
}

macro_rules! impl_raw_int {
	($($ty:ty),* $(,)?) => {
		$(
			impl RawValue for $ty {
				const SIZE: usize = std::mem::size_of::<$ty>();

				fn from_raw(bytes: &[u8]) -> Self {
					let mut buf = [0_u8; std::mem::size_of::<$ty>()];
					buf.copy_from_slice(&bytes[..Self::SIZE]);
					<$ty>::from_le_bytes(buf)
				}

				fn write_raw(&self, out: &mut [u8]) {
					out[..Self::SIZE].copy_from_slice(&self.to_le_bytes());
				}
			}
		)*
	};
}

impl_raw_int!(u8, i8, u16, i16, u32, i32, u64, i64, u128, i128, f32, f64);

impl RawValue for bool {
	const SIZE: usize = 1;

	fn from_raw(bytes: &[u8]) -> Self {
		bytes[0] != 0
	}

	fn write_raw(&self, out: &mut [u8]) {
		out[0] = u8::from(*self);
	}
}

impl<const N: usize> RawValue for [u8; N] {
	const SIZE: usize = N;

	fn from_raw(bytes: &[u8]) -> Self {
		let mut out = [0_u8; N];
		out.copy_from_slice(&bytes[..N]);
		out
	}

	fn write_raw(&self, out: &mut [u8]) {
		out[..N].copy_from_slice(self);
	}
}

/// Encode a value into a fresh byte vector.
pub fn raw_bytes<T: RawValue>(value: T) -> Vec<u8> {
	let mut out = vec![0_u8; T::SIZE];
	value.write_raw(&mut out);
	out
}

#[cfg(test)]
mod tests {
	use super::{RawValue, raw_bytes};

	#[test]
	fn integers_are_little_endian() {
		assert_eq!(raw_bytes(0x0102_0304_u32), vec![4, 3, 2, 1]);
		assert_eq!(i16::from_raw(&[0xfe, 0xff]), -2);
	}

	#[test]
	fn float_bits_round_through_bytes() {
		let bytes = raw_bytes(1.5_f32);
		assert_eq!(u32::from_raw(&bytes), 1.5_f32.to_bits());
	}

	#[test]
	fn byte_arrays_copy_verbatim() {
		let value = <[u8; 3]>::from_raw(&[7, 8, 9, 10]);
		assert_eq!(value, [7, 8, 9]);
		assert_eq!(<[u8; 16]>::SIZE, 16);
	}
}
