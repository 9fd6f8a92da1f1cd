mod bson;
mod collection;
mod errors;

pub use bson::{serde_string_map, serde_string_set, Id};
pub use collection::{ensure_indexes_exist, Coll, MongoCollection};
pub use errors::{is_duplicate_key_error, is_transient_transaction_error, is_unknown_commit_result};
