//! Value formatters registered on every new session.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

use crate::dump::{Dump, DumpError, Result, ValueReader};

/// Type name of the runtime GUID struct.
pub const GUID_TYPE: &str = "System.Guid";
/// Type name of the runtime date-time struct.
pub const DATE_TIME_TYPE: &str = "System.DateTime";

const TICKS_PER_SECOND: u64 = 10_000_000;
const TICKS_MASK: u64 = 0x3FFF_FFFF_FFFF_FFFF;

pub(crate) fn register_defaults(dump: &Dump) {
	dump.register_formatter(GUID_TYPE, format_guid).register_formatter(DATE_TIME_TYPE, format_date_time);
}

/// Render a 16-byte GUID as lowercase hyphenated text.
pub fn format_guid(reader: &ValueReader<'_>) -> Result<String> {
	let bytes = reader.read::<[u8; 16]>()?;
	Ok(uguid::Guid::from_bytes(bytes).to_string())
}

/// Render a date-time word as ISO-8601 without a zone suffix.
///
/// The low 62 bits count 100 ns ticks since 0001-01-01; the top two bits hold the kind flag.
pub fn format_date_time(reader: &ValueReader<'_>) -> Result<String> {
	let ticks = reader.read::<u64>()? & TICKS_MASK;
	let moment = date_time_from_ticks(ticks).ok_or_else(|| DumpError::InvalidValue {
		type_name: DATE_TIME_TYPE.to_owned(),
		reason: format!("{ticks} ticks out of range"),
	})?;

	let fraction = ticks % TICKS_PER_SECOND;
	let mut text = moment.format("%Y-%m-%dT%H:%M:%S").to_string();
	if fraction != 0 {
		text.push_str(&format!(".{fraction:07}"));
	}
	Ok(text)
}

fn date_time_from_ticks(ticks: u64) -> Option<NaiveDateTime> {
	let epoch = NaiveDate::from_ymd_opt(1, 1, 1)?.and_hms_opt(0, 0, 0)?;
	let seconds = i64::try_from(ticks / TICKS_PER_SECOND).ok()?;
	epoch.checked_add_signed(TimeDelta::try_seconds(seconds)?)
}
