mod build;
mod catalog;
mod document;
mod load;
mod schema;
mod types;

pub use catalog::{catalog, Catalog};
pub use document::{DefinitionError, Document};
pub use load::load_document;
pub use schema::{AdditionalProperties, SchemaArena, SchemaId, SchemaSpec, SchemaType};
pub use types::*;
