//! Recording value objects

pub mod buffer;
pub mod duration;
pub mod format;
pub mod packet;

pub use buffer::BufferSlot;
pub use duration::Duration;
pub use format::{Codec, ContainerFormat, StreamFormat};
pub use packet::{CaptureTimestamp, CodecSideInfo, PacketDescription};
