//! API request handlers

mod discovery;
mod events;
mod health;
mod invokers;
mod providers;
mod publish;
mod security;

pub use discovery::*;
pub use events::*;
pub use health::*;
pub use invokers::*;
pub use providers::*;
pub use publish::*;
pub use security::*;
