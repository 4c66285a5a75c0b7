pub mod cache;
pub mod clean_target;
pub mod episode;
pub mod field_map;
pub mod inputs;
pub mod lookup;
pub mod resolvers;
pub mod task;

pub use cache::{LookupCache, LookupKey};
pub use clean_target::{CleanReport, CleanTarget};
pub use episode::{EpisodeQuery, EpisodeScheme};
pub use field_map::{project_fields, FieldMap};
pub use inputs::InputRunner;
pub use lookup::{derive_year, display_title, LookupResolver};
pub use resolvers::SeplisLookup;
pub use task::{RunOptions, TaskResult, TaskRunner};
