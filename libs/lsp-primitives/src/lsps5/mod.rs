pub mod schema;
pub mod validation;
