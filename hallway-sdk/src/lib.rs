//! hallway-sdk: client surface for the chat platform.
//!
//! Outbound calls go through the [`platform::Platform`] trait (REST-backed
//! in production, see [`rest`]); inbound events arrive over the [`gateway`]
//! websocket session as [`event::GatewayEvent`]s.

pub mod error;
pub mod event;
pub mod gateway;
pub mod model;
pub mod platform;
pub mod rest;
