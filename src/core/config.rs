mod parsing;
mod secret;
mod settings;
mod types;

pub(crate) use types::{ConfigError, ImportSettings, Settings};
#[cfg(test)]
pub(crate) use types::Environment;
