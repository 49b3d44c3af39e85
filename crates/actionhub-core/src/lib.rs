pub mod classifier;
pub mod envelope;
pub mod error;
pub mod pagination;
pub mod resolver;
pub mod sanitization;
pub mod types;

// Re-export commonly used types
pub use classifier::{classify, inspect};
pub use envelope::{EnvelopeWire, Failure, ResponseEnvelope};
pub use error::{CoreError, CoreResult, ErrorKind, ErrorRecord, Fault};
pub use pagination::{
    Page, PageProtocol, PageRequest, PaginationError, PaginationOutcome, PaginationState, Paginator,
    PartialResults,
};
pub use resolver::{JsonMap, ListQuery, ReadMode, ReadPolicy};
pub use sanitization::{is_sensitive_key, redact};
pub use types::{ActionDescriptor, ParamSpec, TypeTag};
