pub mod coerce;
pub mod ids;
pub mod messages;
pub mod mock;
pub mod notice;
pub mod recipes;
pub mod session;
pub mod transport;
