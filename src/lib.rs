//! Red light / green light game server
//!
//! Camera frames are scanned for each player's reference color, the blob
//! centers are smoothed into stable positions, and a timed MOVE/FREEZE state
//! machine eliminates players who move while the light is red.

pub mod app;
pub mod capture;
pub mod config;
pub mod game;
pub mod http;
pub mod tracking;
pub mod util;
pub mod vision;
pub mod ws;
