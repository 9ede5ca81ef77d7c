use std::fmt;

use crate::dump::{DumpError, ElementKind, Result};

/// Decoded fixed-width scalar with its original bit pattern.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scalar {
	kind: ElementKind,
	bits: u64,
	size: u8,
}

impl Scalar {
	/// Decode little-endian `bytes` as one `kind` value.
	pub fn decode(kind: ElementKind, bytes: &[u8]) -> Result<Self> {
		if !kind.is_primitive() && !kind.is_pointer() {
			return Err(DumpError::NotScalar { kind });
		}
		if bytes.is_empty() || bytes.len() > 8 {
			return Err(DumpError::UnsupportedPointerSize { size: bytes.len() });
		}

		let mut buf = [0_u8; 8];
		buf[..bytes.len()].copy_from_slice(bytes);
		Ok(Self {
			kind,
			bits: u64::from_le_bytes(buf),
			size: bytes.len() as u8,
		})
	}

	/// Synthesized `System.Int32` value.
	pub fn from_i32(value: i32) -> Self {
		Self {
			kind: ElementKind::Int32,
			bits: u64::from(value as u32),
			size: 4,
		}
	}

	/// Element kind this scalar was decoded as.
	pub fn kind(&self) -> ElementKind {
		self.kind
	}

	/// Storage width in bytes.
	pub fn size(&self) -> usize {
		usize::from(self.size)
	}

	/// Raw little-endian storage bytes.
	pub fn bytes(&self) -> Vec<u8> {
		self.bits.to_le_bytes()[..self.size()].to_vec()
	}

	/// Bit pattern sign-extended to 64 bits for signed kinds.
	pub fn extended_bits(&self) -> u64 {
		if self.is_signed() {
			let shift = 64 - u32::from(self.size) * 8;
			(((self.bits << shift) as i64) >> shift) as u64
		} else {
			self.bits
		}
	}

	/// Whether this scalar equals an enum member value declared as 64-bit extended bits.
	pub fn matches_bits(&self, declared: u64) -> bool {
		let mask = if self.size >= 8 { u64::MAX } else { (1_u64 << (u32::from(self.size) * 8)) - 1 };
		(self.bits & mask) == (declared & mask)
	}

	/// Runtime type name for the decoded kind.
	pub fn type_name(&self) -> &'static str {
		self.kind.type_name()
	}

	fn is_signed(&self) -> bool {
		matches!(
			self.kind,
			ElementKind::Int8 | ElementKind::Int16 | ElementKind::Int32 | ElementKind::Int64 | ElementKind::NativeInt
		)
	}
}

impl fmt::Display for Scalar {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.kind {
			ElementKind::Boolean => write!(f, "{}", self.bits != 0),
			ElementKind::Char => {
				let unit = self.bits as u16;
				let ch = char::decode_utf16([unit]).next().and_then(|item| item.ok()).unwrap_or(char::REPLACEMENT_CHARACTER);
				write!(f, "{ch}")
			}
			ElementKind::Float => write!(f, "{}", f32::from_bits(self.bits as u32)),
			ElementKind::Double => write!(f, "{}", f64::from_bits(self.bits)),
			ElementKind::Pointer | ElementKind::FunctionPointer => write!(f, "0x{:016x}", self.bits),
			_ if self.is_signed() => write!(f, "{}", self.extended_bits() as i64),
			_ => write!(f, "{}", self.bits),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::Scalar;
	use crate::dump::ElementKind;

	#[test]
	fn signed_values_render_negative() {
		let value = Scalar::decode(ElementKind::Int16, &(-3_i16).to_le_bytes()).expect("decodes");
		assert_eq!(value.to_string(), "-3");
		assert_eq!(value.extended_bits(), (-3_i64) as u64);
	}

	#[test]
	fn native_int_width_follows_bytes() {
		let value = Scalar::decode(ElementKind::NativeInt, &(-1_i32).to_le_bytes()).expect("decodes");
		assert_eq!(value.size(), 4);
		assert_eq!(value.to_string(), "-1");
	}

	#[test]
	fn char_renders_utf16_unit() {
		let value = Scalar::decode(ElementKind::Char, &u16::from(b'Q').to_le_bytes()).expect("decodes");
		assert_eq!(value.to_string(), "Q");
	}

	#[test]
	fn bits_match_ignores_extension() {
		let value = Scalar::decode(ElementKind::Int8, &[0xff]).expect("decodes");
		assert!(value.matches_bits(u64::MAX));
		assert!(value.matches_bits(0xff));
		assert!(!value.matches_bits(0xfe));
	}

	#[test]
	fn struct_kind_is_rejected() {
		assert!(Scalar::decode(ElementKind::Struct, &[0; 4]).is_err());
	}
}
