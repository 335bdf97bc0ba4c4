pub mod config;
pub mod data;
pub mod query;

#[cfg(test)]
pub(crate) mod testing;
