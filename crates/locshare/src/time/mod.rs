mod clock;
mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use timer::{TimerId, TimerKind, TimerQueue};
