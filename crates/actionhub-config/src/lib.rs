pub mod error;
pub mod loader;
pub mod logging;
pub mod settings;

// Re-export commonly used types
pub use error::{ConfigError, ConfigResult};
pub use loader::{
    ActionDeclaration, AuthDeclaration, DeclarationLoader, FileFormat, IntegrationDeclaration,
    ObjectSchema, PropertySchema,
};
pub use settings::RuntimeSettings;
