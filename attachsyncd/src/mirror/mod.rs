pub mod budget;
pub mod engine;
pub mod folder_cache;
pub mod paths;
pub mod ports;
#[cfg(test)]
pub(crate) mod stubs;
pub mod transfer;
