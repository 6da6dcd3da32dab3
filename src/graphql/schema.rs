use async_graphql::{EmptySubscription, Schema};

use super::mutations::MutationRoot;
use super::queries::QueryRoot;

/// GraphQL Schema type
pub type GainsSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

/// Build the GraphQL schema
pub fn build_schema() -> GainsSchema {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription).finish()
}
