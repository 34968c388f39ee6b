use crate::val::Duration;
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::ops::Deref;

/// A date and time value with UTC timezone.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Datetime(pub DateTime<Utc>);

impl Default for Datetime {
	fn default() -> Self {
		Self(Utc::now())
	}
}

impl From<DateTime<Utc>> for Datetime {
	fn from(v: DateTime<Utc>) -> Self {
		Self(v)
	}
}

impl From<Datetime> for DateTime<Utc> {
	fn from(d: Datetime) -> Self {
		d.0
	}
}

impl Deref for Datetime {
	type Target = DateTime<Utc>;
	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

impl Datetime {
	/// The unix epoch
	pub fn epoch() -> Datetime {
		Datetime(Utc.timestamp_opt(0, 0).single().unwrap_or_default())
	}
	/// Nanoseconds since the unix epoch
	pub fn timestamp_nanos(&self) -> i64 {
		self.0.timestamp_nanos_opt().unwrap_or_default()
	}
	/// Add a duration to this datetime, saturating on overflow
	pub fn add_duration(&self, d: &Duration) -> Datetime {
		match chrono::Duration::from_std(d.0) {
			Ok(v) => Datetime(self.0 + v),
			Err(_) => Datetime(DateTime::<Utc>::MAX_UTC),
		}
	}
	/// Subtract a duration from this datetime, saturating on overflow
	pub fn sub_duration(&self, d: &Duration) -> Datetime {
		match chrono::Duration::from_std(d.0) {
			Ok(v) => Datetime(self.0 - v),
			Err(_) => Datetime(DateTime::<Utc>::MIN_UTC),
		}
	}
	/// The absolute difference between two datetimes
	pub fn diff(&self, other: &Datetime) -> Duration {
		let delta = if self.0 >= other.0 {
			self.0 - other.0
		} else {
			other.0 - self.0
		};
		Duration(delta.to_std().unwrap_or_default())
	}
}

impl Display for Datetime {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		write!(f, "{}", self.0.to_rfc3339_opts(SecondsFormat::AutoSi, true))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn datetime_arithmetic() {
		let epoch = Datetime::epoch();
		let later = epoch.add_duration(&Duration::from_secs(90));
		assert_eq!(later.diff(&epoch), Duration::from_secs(90));
		assert_eq!(later.sub_duration(&Duration::from_secs(90)), epoch);
	}
}
