pub mod dns;
pub mod system;
