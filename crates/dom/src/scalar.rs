//! Closed set of scalar values a template can write into a dynamic position.

use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Tag of a [`Scalar`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
	/// Text.
	Str,
	/// Boolean.
	Bool,
	/// Signed integer.
	Int,
	/// Unsigned integer.
	UInt,
	/// Floating point number.
	Float,
	/// Calendar date.
	Date,
	/// Wall-clock time.
	Time,
	/// Date and time without zone.
	DateTime,
}

/// A scalar value written into a value or attribute slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
	/// Text.
	Str(Arc<str>),
	/// Boolean.
	Bool(bool),
	/// Signed integer.
	Int(i64),
	/// Unsigned integer.
	UInt(u64),
	/// Floating point number.
	Float(f64),
	/// Calendar date.
	Date(NaiveDate),
	/// Wall-clock time.
	Time(NaiveTime),
	/// Date and time, microsecond precision.
	DateTime(NaiveDateTime),
}

impl Scalar {
	/// Returns the variant tag.
	pub fn kind(&self) -> ScalarKind {
		match self {
			Self::Str(_) => ScalarKind::Str,
			Self::Bool(_) => ScalarKind::Bool,
			Self::Int(_) => ScalarKind::Int,
			Self::UInt(_) => ScalarKind::UInt,
			Self::Float(_) => ScalarKind::Float,
			Self::Date(_) => ScalarKind::Date,
			Self::Time(_) => ScalarKind::Time,
			Self::DateTime(_) => ScalarKind::DateTime,
		}
	}

	/// Splits into the slot payload pair: reference text (strings only) and value bits.
	pub(crate) fn into_parts(self) -> (ScalarKind, Option<Arc<str>>, u64) {
		let kind = self.kind();
		match self {
			Self::Str(text) => (kind, Some(text), 0),
			Self::Bool(b) => (kind, None, u64::from(b)),
			Self::Int(n) => (kind, None, n as u64),
			Self::UInt(n) => (kind, None, n),
			Self::Float(f) => (kind, None, f.to_bits()),
			Self::Date(d) => (kind, None, i64::from(d.num_days_from_ce()) as u64),
			Self::Time(t) => (kind, None, u64::from(t.num_seconds_from_midnight()) * NANOS_PER_SEC + u64::from(t.nanosecond())),
			Self::DateTime(dt) => (kind, None, dt.and_utc().timestamp_micros() as u64),
		}
	}

	/// Rebuilds a scalar from slot payloads. `None` only for bit patterns no encoder produces.
	pub(crate) fn from_parts(kind: ScalarKind, text: Option<&Arc<str>>, bits: u64) -> Option<Self> {
		Some(match kind {
			ScalarKind::Str => Self::Str(text.cloned().unwrap_or_else(|| Arc::from(""))),
			ScalarKind::Bool => Self::Bool(bits != 0),
			ScalarKind::Int => Self::Int(bits as i64),
			ScalarKind::UInt => Self::UInt(bits),
			ScalarKind::Float => Self::Float(f64::from_bits(bits)),
			ScalarKind::Date => Self::Date(NaiveDate::from_num_days_from_ce_opt(i32::try_from(bits as i64).ok()?)?),
			ScalarKind::Time => {
				let secs = u32::try_from(bits / NANOS_PER_SEC).ok()?;
				let nanos = u32::try_from(bits % NANOS_PER_SEC).ok()?;
				Self::Time(NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)?)
			}
			ScalarKind::DateTime => Self::DateTime(DateTime::from_timestamp_micros(bits as i64)?.naive_utc()),
		})
	}

	/// Renders the value as display text.
	///
	/// Format specifiers: `x`/`X` print integers in hex, `.N` fixes float
	/// precision, and date/time variants take a chrono `strftime` pattern.
	/// Unknown or invalid specifiers fall back to the default rendering.
	pub fn render(&self, format: Option<&str>, out: &mut String) {
		match (self, format) {
			(Self::Str(text), _) => out.push_str(text),
			(Self::Bool(b), _) => out.push_str(if *b { "true" } else { "false" }),
			(Self::Int(n), Some("x")) => _ = write!(out, "{n:x}"),
			(Self::Int(n), Some("X")) => _ = write!(out, "{n:X}"),
			(Self::Int(n), _) => _ = write!(out, "{n}"),
			(Self::UInt(n), Some("x")) => _ = write!(out, "{n:x}"),
			(Self::UInt(n), Some("X")) => _ = write!(out, "{n:X}"),
			(Self::UInt(n), _) => _ = write!(out, "{n}"),
			(Self::Float(f), Some(spec)) if spec.starts_with('.') => match spec[1..].parse::<usize>() {
				Ok(precision) => _ = write!(out, "{f:.precision$}"),
				Err(_) => _ = write!(out, "{f}"),
			},
			(Self::Float(f), _) => _ = write!(out, "{f}"),
			(Self::Date(d), spec) => write_chrono(out, spec, "%Y-%m-%d", |fmt, buf| write!(buf, "{}", d.format(fmt))),
			(Self::Time(t), spec) => write_chrono(out, spec, "%H:%M:%S", |fmt, buf| write!(buf, "{}", t.format(fmt))),
			(Self::DateTime(dt), spec) => write_chrono(out, spec, "%Y-%m-%dT%H:%M:%S", |fmt, buf| write!(buf, "{}", dt.format(fmt))),
		}
	}

	/// Renders into a fresh string.
	pub fn to_text(&self, format: Option<&str>) -> String {
		let mut out = String::new();
		self.render(format, &mut out);
		out
	}
}

/// chrono reports bad patterns as `fmt::Error`, so render into scratch space first.
fn write_chrono(out: &mut String, spec: Option<&str>, default: &str, write: impl Fn(&str, &mut String) -> std::fmt::Result) {
	if let Some(spec) = spec {
		let mut scratch = String::new();
		if write(spec, &mut scratch).is_ok() {
			out.push_str(&scratch);
			return;
		}
		tracing::debug!(spec, "dom.scalar.bad_format");
	}
	let _ = write(default, out);
}

impl From<&str> for Scalar {
	fn from(value: &str) -> Self {
		Self::Str(Arc::from(value))
	}
}

impl From<String> for Scalar {
	fn from(value: String) -> Self {
		Self::Str(Arc::from(value))
	}
}

impl From<Arc<str>> for Scalar {
	fn from(value: Arc<str>) -> Self {
		Self::Str(value)
	}
}

impl From<bool> for Scalar {
	fn from(value: bool) -> Self {
		Self::Bool(value)
	}
}

impl From<i32> for Scalar {
	fn from(value: i32) -> Self {
		Self::Int(i64::from(value))
	}
}

impl From<i64> for Scalar {
	fn from(value: i64) -> Self {
		Self::Int(value)
	}
}

impl From<u32> for Scalar {
	fn from(value: u32) -> Self {
		Self::UInt(u64::from(value))
	}
}

impl From<u64> for Scalar {
	fn from(value: u64) -> Self {
		Self::UInt(value)
	}
}

impl From<usize> for Scalar {
	fn from(value: usize) -> Self {
		Self::UInt(value as u64)
	}
}

impl From<f64> for Scalar {
	fn from(value: f64) -> Self {
		Self::Float(value)
	}
}

impl From<NaiveDate> for Scalar {
	fn from(value: NaiveDate) -> Self {
		Self::Date(value)
	}
}

impl From<NaiveTime> for Scalar {
	fn from(value: NaiveTime) -> Self {
		Self::Time(value)
	}
}

impl From<NaiveDateTime> for Scalar {
	fn from(value: NaiveDateTime) -> Self {
		Self::DateTime(value)
	}
}
