pub mod config;
pub mod dispatch;
pub mod dispatcher;
pub mod error;
pub mod presence;
pub mod registry;
pub mod shutdown;
pub mod wire;
mod worker;

pub use dispatcher::{Dispatcher, JobProvider};
pub use error::{DispatchError, Result};
