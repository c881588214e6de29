pub mod api_key;
pub mod chat;
pub mod error;
pub mod model;
pub mod oplog;

pub use api_key::ApiKey;
pub use error::CoreError;
pub use model::ModelCatalog;
pub use oplog::{log_operation, Operation};
