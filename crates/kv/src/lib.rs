pub mod snapshot;
pub mod store;
pub mod value;

pub use snapshot::SnapshotRecord;
pub use store::{KvStore, StoreError};
pub use value::StoredValue;
