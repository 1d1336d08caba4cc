pub mod query;
pub mod tokens;
pub mod tx;
