pub mod code;
pub mod debug;
pub mod error;
pub mod runtime;

pub use code::Code;
pub use error::{RuntimeError, RuntimeResult};
pub use runtime::{Config, Runtime};
