pub mod context;
pub mod error;
pub mod handler;
pub mod registry;
pub mod validation;

pub use context::{
    CredentialBag, ExecutionContext, FetchRequest, Transport, TransportError, TransportResponse,
};
pub use error::{RegistryError, RegistryResult};
pub use handler::{handler_fn, ActionHandler, FnHandler};
pub use registry::ActionRegistry;
pub use validation::validate_inputs;

pub use http::Method;
