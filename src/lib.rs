//! Real-time hand landmark overlay for a live camera feed.
//!
//! A [`pipeline::FrameLoop`] pulls frames from a [`capture::FrameSource`],
//! hands them to an asynchronous hand detector one at a time, and draws
//! each result as a skeletal overlay on a [`render::DisplaySurface`].

pub mod capture;
pub mod detection;
pub mod lyrics;
pub mod output;
pub mod pipeline;
pub mod render;
pub mod status;
