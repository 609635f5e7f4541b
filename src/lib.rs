pub mod catalog;
pub mod config;
pub mod coordinator;
pub mod messages;
pub mod path;
pub mod runtime;
pub mod state;
pub mod stop;
pub mod transform;
pub mod transport;
pub mod voice;
