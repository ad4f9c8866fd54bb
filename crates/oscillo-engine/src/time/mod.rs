//! Time subsystem.
//!
//! Two clocks live here:
//! - `FrameClock` paces the render loop (one `tick()` per presented frame)
//! - `Clock` implementations give stream time, the unit sample timestamps use

mod frame_clock;
mod stream_clock;

pub use frame_clock::{FrameClock, FrameTime};
pub use stream_clock::{Clock, ManualClock, SystemClock, MICROSECOND, MILLISECOND, NANOSECOND, SECOND};
