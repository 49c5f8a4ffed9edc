pub mod builder;
mod error;
mod writer;

pub use builder::IndexBuilder;
pub use error::BuildError;
pub use writer::WriteShard;
