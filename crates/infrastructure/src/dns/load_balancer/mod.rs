pub mod dispatcher;
pub mod fastest;
pub mod pool;
pub mod reachability;
pub mod scatter;
pub mod selection;

pub use dispatcher::Dispatcher;
pub use fastest::{FastestAnswer, SELECTED_ANSWER_TTL};
pub use pool::ResolverPool;
pub use reachability::TcpReachability;
pub use scatter::scatter_gather;
pub use selection::select_fastest;
