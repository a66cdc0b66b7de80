//! CLI command implementations.

pub(crate) mod config;
pub(crate) mod convert;
pub(crate) mod version;

pub(crate) use config::ConfigArgs;
pub(crate) use convert::ConvertArgs;
