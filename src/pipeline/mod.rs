mod clock;
mod frame_loop;
mod state;

pub use clock::FrameClock;
pub use frame_loop::{Delivery, Exit, FrameLoop, FrameLoopError, Step};
pub use state::{Epoch, LoopState};
