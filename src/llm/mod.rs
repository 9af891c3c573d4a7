pub mod client;
pub mod json_extract;
pub mod provider;
pub mod providers;
pub mod registry;
pub mod sse_parser;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;
