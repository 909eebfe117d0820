pub mod checkpoint;
pub mod dispatch;
pub mod driver;
pub mod message;
pub mod roles;
pub mod tools;

pub use checkpoint::*;
pub use dispatch::*;
pub use driver::*;
pub use message::*;
pub use roles::*;
pub use tools::*;
