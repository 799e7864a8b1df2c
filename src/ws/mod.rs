//! WebSocket subscription for the render/UI layer

pub mod handler;
pub mod protocol;
