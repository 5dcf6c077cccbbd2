pub mod config;
pub mod logging;
pub mod resolvers;
pub mod subnet;

pub use config::load_config;
pub use logging::init_logging;
pub use resolvers::build_resolver_pool;
pub use subnet::build_subnet_policy;
