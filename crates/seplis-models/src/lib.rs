pub mod entry;
pub mod field_value;
pub mod record;

pub use entry::{Entry, LazyResolver};
pub use field_value::FieldValue;
pub use record::{EntityKind, RemoteRecord};
