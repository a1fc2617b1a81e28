pub(crate) mod cursor;
pub mod result_set;
mod statistics;
