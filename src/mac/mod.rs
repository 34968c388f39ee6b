/// Creates a new struct value from key-value pairs
#[macro_export]
#[doc(hidden)]
macro_rules! obj {
	($($k:expr => $v:expr),* $(,)?) => {{
		let mut o = $crate::val::Object::default();
		$(o.set($crate::sym::sym($k), $crate::val::Value::from($v));)*
		o
	}};
}

/// A macro that allows lazily parsing a value from the environment variable,
/// with a fallback default value if the variable is not set or parsing fails.
#[macro_export]
#[doc(hidden)]
macro_rules! lazy_env_parse {
	($key:expr, $t:ty, $default:expr) => {
		once_cell::sync::Lazy::new(|| {
			std::env::var($key)
				.and_then(|s| Ok(s.parse::<$t>().unwrap_or($default)))
				.unwrap_or($default)
		})
	};
}

/// Lazily parses an environment variable into a specified type, falling back
/// to a default function when the variable is not set or fails to parse.
#[macro_export]
#[doc(hidden)]
macro_rules! lazy_env_parse_or_else {
	($key:expr, $t:ty, $default:expr) => {
		once_cell::sync::Lazy::new(|| {
			std::env::var($key)
				.and_then(|s| Ok(s.parse::<$t>().unwrap_or_else($default)))
				.unwrap_or_else($default)
		})
	};
}
