pub mod context;
pub mod mutations;
pub mod queries;
pub mod schema;
pub mod types;

pub use context::RequestContext;
pub use schema::{build_schema, GainsSchema};
