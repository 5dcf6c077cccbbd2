#![allow(dead_code)]

pub mod builders;
pub mod dot_server;
pub mod stubs;
