mod arena;
mod codec;
pub mod config;
mod error;
mod event;
mod link;
mod transport;

pub use arena::{Arena, ArenaMark};
pub use codec::{Codec, Decode, DecodeSink, Handshake};
pub use error::LinkError;
pub use event::{Event, EventQueue, FrameInfo, Slice, SliceFlags};
pub use link::{Link, LinkState};
pub use transport::Transport;
