pub mod builders;
pub mod schema;
pub mod util;
