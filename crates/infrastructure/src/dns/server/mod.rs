mod front_end;
mod refresh;
mod state;

pub use front_end::{FrontEndSettings, PipelineChannels, UdpFrontEnd, MAX_UDP_PACKET};
pub use state::FrontEndState;
