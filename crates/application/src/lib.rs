//! dotrelay application layer: the pipeline envelope and the ports the
//! infrastructure implements.
pub mod exchange;
pub mod ports;

pub use exchange::Exchange;
