pub mod common_schemas;
pub mod parameter_validation;
pub mod schema;
pub mod util;
