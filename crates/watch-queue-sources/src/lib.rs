pub mod traits;
pub mod snapshot;
pub mod factory;
pub mod collect;
pub mod error;

pub use traits::{SeriesData, SiteAdapter};
pub use snapshot::{parse_duration, service_for_url, PageSnapshot, SnapshotAdapter};
pub use factory::{AdapterFactory, AdapterRegistry, SnapshotFactory};
pub use collect::collect_candidates;
pub use error::{Result, SourceError};
