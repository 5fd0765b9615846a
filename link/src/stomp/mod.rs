//! STOMP 1.2 wire format.
//!
//! - [`frame`]: frame model, encoder and streaming decoder
//! - [`heartbeat`]: `heart-beat` header parsing and negotiation

pub mod frame;
pub mod heartbeat;

pub use frame::{Command, Frame, FrameDecoder, MAX_FRAME_BYTES};
pub use heartbeat::Heartbeat;

/// WebSocket subprotocols offered during the upgrade, most preferred first.
pub const STOMP_SUBPROTOCOLS: &str = "v12.stomp, v11.stomp, v10.stomp";

/// Versions offered in the CONNECT frame.
pub const ACCEPT_VERSION: &str = "1.2,1.1";

pub mod headers {
    pub const ACCEPT_VERSION: &str = "accept-version";
    pub const AUTHORIZATION: &str = "Authorization";
    pub const CONTENT_LENGTH: &str = "content-length";
    pub const CONTENT_TYPE: &str = "content-type";
    pub const DESTINATION: &str = "destination";
    pub const HEART_BEAT: &str = "heart-beat";
    pub const HOST: &str = "host";
    pub const ID: &str = "id";
    pub const MESSAGE: &str = "message";
    pub const MESSAGE_ID: &str = "message-id";
    pub const RECEIPT: &str = "receipt";
    pub const SUBSCRIPTION: &str = "subscription";
    pub const VERSION: &str = "version";
}
