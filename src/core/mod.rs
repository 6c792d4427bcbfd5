mod args;
mod error;
mod logger;

pub use args::{CliArgs, Command, EncodingArg};
pub use error::BlockcolError;
pub use logger::setup_logging;
