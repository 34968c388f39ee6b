use once_cell::sync::Lazy;
use std::path::PathBuf;

/// The maximum nesting depth of struct and block literals in a query.
pub static MAX_OBJECT_PARSING_DEPTH: Lazy<usize> =
	lazy_env_parse!("GQL_MAX_OBJECT_PARSING_DEPTH", usize, 100);

/// The maximum recursion depth of expressions in a query.
pub static MAX_QUERY_PARSING_DEPTH: Lazy<usize> =
	lazy_env_parse!("GQL_MAX_QUERY_PARSING_DEPTH", usize, 128);

/// The number of retained rows above which a min-N sort switches from a
/// full sort to a bounded heap.
pub static SORT_HEAP_THRESHOLD: Lazy<usize> =
	lazy_env_parse!("GQL_SORT_HEAP_THRESHOLD", usize, 65_536);

/// The directory under which join results are materialized, keyed by content hash.
pub static CACHE_DIR: Lazy<PathBuf> = lazy_env_parse_or_else!("GQL_CACHE_DIR", PathBuf, |_| {
	std::env::temp_dir().join("gql-cache")
});
