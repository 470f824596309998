pub(crate) mod config;
pub(crate) mod export;
pub(crate) mod producer;
pub(crate) mod runtime;
pub(crate) mod tooling;
