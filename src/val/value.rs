use crate::err::Error;
use crate::tbl::Table;
use crate::val::digest::Fold;
use crate::val::{Datetime, Digest, Duration, Func, Object, Strand};
use std::cmp::Ordering;
use std::fmt::{self, Display, Formatter};

/// A single GQL value.
#[derive(Clone, Debug, Default)]
#[non_exhaustive]
pub enum Value {
	// These value kinds are scalar values whose
	// content hash is computed eagerly on demand.
	#[default]
	Null,
	Bool(bool),
	Int(i64),
	Float(f64),
	Char(char),
	Strand(Strand),
	Datetime(Datetime),
	Duration(Duration),
	// These value kinds are composites whose
	// content hash is computed lazily and cached.
	Object(Object),
	Fragment(Object),
	Table(Table),
	Func(Func),
}

/// The kind of a value.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum Kind {
	Null,
	Bool,
	Int,
	Float,
	Char,
	Strand,
	Datetime,
	Duration,
	Struct,
	Fragment,
	Table,
	Func,
}

impl Display for Kind {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		match self {
			Kind::Null => write!(f, "null"),
			Kind::Bool => write!(f, "bool"),
			Kind::Int => write!(f, "int"),
			Kind::Float => write!(f, "float"),
			Kind::Char => write!(f, "char"),
			Kind::Strand => write!(f, "string"),
			Kind::Datetime => write!(f, "datetime"),
			Kind::Duration => write!(f, "duration"),
			Kind::Struct => write!(f, "struct"),
			Kind::Fragment => write!(f, "fragment"),
			Kind::Table => write!(f, "table"),
			Kind::Func => write!(f, "func"),
		}
	}
}

impl From<bool> for Value {
	fn from(v: bool) -> Self {
		Value::Bool(v)
	}
}

impl From<i32> for Value {
	fn from(v: i32) -> Self {
		Value::Int(v as i64)
	}
}

impl From<i64> for Value {
	fn from(v: i64) -> Self {
		Value::Int(v)
	}
}

impl From<f64> for Value {
	fn from(v: f64) -> Self {
		Value::Float(v)
	}
}

impl From<char> for Value {
	fn from(v: char) -> Self {
		Value::Char(v)
	}
}

impl From<&str> for Value {
	fn from(v: &str) -> Self {
		Value::Strand(v.into())
	}
}

impl From<String> for Value {
	fn from(v: String) -> Self {
		Value::Strand(v.into())
	}
}

impl From<Strand> for Value {
	fn from(v: Strand) -> Self {
		Value::Strand(v)
	}
}

impl From<Datetime> for Value {
	fn from(v: Datetime) -> Self {
		Value::Datetime(v)
	}
}

impl From<Duration> for Value {
	fn from(v: Duration) -> Self {
		Value::Duration(v)
	}
}

impl From<Object> for Value {
	fn from(v: Object) -> Self {
		Value::Object(v)
	}
}

impl From<Table> for Value {
	fn from(v: Table) -> Self {
		Value::Table(v)
	}
}

impl From<Func> for Value {
	fn from(v: Func) -> Self {
		Value::Func(v)
	}
}

impl Value {
	/// The kind of this value
	pub fn kind(&self) -> Kind {
		match self {
			Value::Null => Kind::Null,
			Value::Bool(_) => Kind::Bool,
			Value::Int(_) => Kind::Int,
			Value::Float(_) => Kind::Float,
			Value::Char(_) => Kind::Char,
			Value::Strand(_) => Kind::Strand,
			Value::Datetime(_) => Kind::Datetime,
			Value::Duration(_) => Kind::Duration,
			Value::Object(_) => Kind::Struct,
			Value::Fragment(_) => Kind::Fragment,
			Value::Table(_) => Kind::Table,
			Value::Func(_) => Kind::Func,
		}
	}

	/// Check if this value is null
	pub fn is_null(&self) -> bool {
		matches!(self, Value::Null)
	}

	/// The content digest of this value
	pub fn digest(&self) -> Digest {
		match self {
			Value::Null => Digest::of(b"gql:value:null"),
			Value::Bool(v) => Fold::new(b"gql:value:bool").bytes(&[*v as u8]).finish(),
			Value::Int(v) => Fold::new(b"gql:value:int").bytes(&v.to_le_bytes()).finish(),
			Value::Float(v) => {
				// Normalize the zero sign so 0.0 and -0.0 hash identically
				let v = if *v == 0.0 {
					0.0
				} else {
					*v
				};
				Fold::new(b"gql:value:float").bytes(&v.to_bits().to_le_bytes()).finish()
			}
			Value::Char(v) => {
				let mut buf = [0; 4];
				Fold::new(b"gql:value:char").bytes(v.encode_utf8(&mut buf).as_bytes()).finish()
			}
			Value::Strand(v) => Fold::new(b"gql:value:string").bytes(v.as_bytes()).finish(),
			Value::Datetime(v) => Fold::new(b"gql:value:datetime")
				.bytes(&v.timestamp_nanos().to_le_bytes())
				.finish(),
			Value::Duration(v) => Fold::new(b"gql:value:duration")
				.bytes(&v.as_secs().to_le_bytes())
				.bytes(&v.subsec_nanos().to_le_bytes())
				.finish(),
			Value::Object(v) => v.digest(),
			Value::Fragment(v) => Fold::new(b"gql:value:fragment").digest(&v.digest()).finish(),
			Value::Table(v) => v.digest(),
			Value::Func(v) => v.digest(),
		}
	}

	/// Coerce this value into a bool, failing on any other kind
	pub fn to_bool(&self) -> Result<bool, Error> {
		match self {
			Value::Bool(v) => Ok(*v),
			v => Err(Error::TypeMismatch {
				expected: Kind::Bool.to_string(),
				found: v.kind().to_string(),
			}),
		}
	}

	/// Coerce this value into a struct, failing on any other kind
	pub fn to_object(&self) -> Result<&Object, Error> {
		match self {
			Value::Object(v) => Ok(v),
			v => Err(Error::TypeMismatch {
				expected: Kind::Struct.to_string(),
				found: v.kind().to_string(),
			}),
		}
	}

	/// Coerce this value into a table handle, failing on any other kind
	pub fn to_table(&self) -> Result<&Table, Error> {
		match self {
			Value::Table(v) => Ok(v),
			v => Err(Error::TypeMismatch {
				expected: Kind::Table.to_string(),
				found: v.kind().to_string(),
			}),
		}
	}

	/// Coerce this value into a function, failing on any other kind
	pub fn to_func(&self) -> Result<&Func, Error> {
		match self {
			Value::Func(v) => Ok(v),
			v => Err(Error::TypeMismatch {
				expected: Kind::Func.to_string(),
				found: v.kind().to_string(),
			}),
		}
	}

	/// The sort rank of this value's kind. Null ranks greatest so null
	/// keys never collide with valid data in sort comparisons.
	fn rank(&self) -> u8 {
		match self {
			Value::Bool(_) => 0,
			Value::Int(_) | Value::Float(_) => 1,
			Value::Char(_) => 2,
			Value::Strand(_) => 3,
			Value::Datetime(_) => 4,
			Value::Duration(_) => 5,
			Value::Object(_) => 6,
			Value::Fragment(_) => 7,
			Value::Table(_) => 8,
			Value::Func(_) => 9,
			Value::Null => 10,
		}
	}
}

impl PartialEq for Value {
	fn eq(&self, other: &Self) -> bool {
		self.digest() == other.digest()
	}
}

impl Eq for Value {}

impl PartialOrd for Value {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

// Zero signs are normalized so ordering agrees with hash equality
fn fcmp(a: f64, b: f64) -> Ordering {
	let norm = |v: f64| if v == 0.0 {
		0.0
	} else {
		v
	};
	norm(a).total_cmp(&norm(b))
}

impl Ord for Value {
	fn cmp(&self, other: &Self) -> Ordering {
		match (self, other) {
			(Value::Bool(a), Value::Bool(b)) => a.cmp(b),
			(Value::Int(a), Value::Int(b)) => a.cmp(b),
			(Value::Float(a), Value::Float(b)) => fcmp(*a, *b),
			// Numeric kinds share one merged sort order
			(Value::Int(a), Value::Float(b)) => fcmp(*a as f64, *b),
			(Value::Float(a), Value::Int(b)) => fcmp(*a, *b as f64),
			(Value::Char(a), Value::Char(b)) => a.cmp(b),
			(Value::Strand(a), Value::Strand(b)) => a.cmp(b),
			(Value::Datetime(a), Value::Datetime(b)) => a.cmp(b),
			(Value::Duration(a), Value::Duration(b)) => a.cmp(b),
			(a, b) => match a.rank().cmp(&b.rank()) {
				// Composites of one kind order by digest, which is
				// arbitrary but total and deterministic
				Ordering::Equal => a.digest().cmp(&b.digest()),
				ord => ord,
			},
		}
	}
}

impl Display for Value {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		match self {
			Value::Null => write!(f, "null"),
			Value::Bool(v) => write!(f, "{v}"),
			Value::Int(v) => write!(f, "{v}"),
			Value::Float(v) => write!(f, "{v:?}"),
			Value::Char(v) => write!(f, "{v:?}"),
			Value::Strand(v) => write!(f, "{v}"),
			Value::Datetime(v) => write!(f, "{v}"),
			Value::Duration(v) => write!(f, "{v}"),
			Value::Object(v) => write!(f, "{v}"),
			Value::Fragment(v) => write!(f, "fragment{v}"),
			Value::Table(v) => write!(f, "{v}"),
			Value::Func(v) => write!(f, "{v}"),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn equality_follows_digest() {
		assert_eq!(Value::from(42), Value::from(42));
		assert_ne!(Value::from(42), Value::from(42.0));
		assert_ne!(Value::Null, Value::from(0));
		assert_eq!(Value::from(0.0), Value::from(-0.0));
	}

	#[test]
	fn numeric_kinds_merge_in_sort_order() {
		assert_eq!(Value::from(2).cmp(&Value::from(2.0)), Ordering::Equal);
		assert_eq!(Value::from(2).cmp(&Value::from(2.5)), Ordering::Less);
	}

	#[test]
	fn null_sorts_last() {
		assert_eq!(Value::Null.cmp(&Value::from("zzz")), Ordering::Greater);
		assert_eq!(Value::from(i64::MAX).cmp(&Value::Null), Ordering::Less);
	}
}
