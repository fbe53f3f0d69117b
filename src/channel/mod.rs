//! Duplex conversation channel: lifecycle, frame codec, and the WebSocket
//! transport.

pub mod traits;
pub mod ws;

pub use traits::{
    decode_frame, Channel, ChannelConnector, ChannelHandle, ChannelState, InboundFrame,
    OutboundFrame,
};
pub use ws::WsConnector;
