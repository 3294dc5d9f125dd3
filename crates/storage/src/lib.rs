pub mod conformance;
mod error;
mod memory;
mod record;
mod traits;

pub use error::StorageError;
pub use memory::MemoryStorage;
pub use record::{
    ArchiveRecords, AuditFilter, DocumentFilter, FileBlob, FlowFilter, ImportCounts,
    SignatureFilter, UserRecord,
};
pub use traits::ArchiveStorage;
