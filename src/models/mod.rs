pub mod diagnostics;
pub mod error;
pub mod health;
pub mod messages;
pub mod participant;
pub mod room;

pub use diagnostics::*;
pub use error::*;
pub use health::*;
pub use messages::*;
pub use participant::*;
pub use room::*;
