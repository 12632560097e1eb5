pub mod analyzer;
pub mod cooldown;
pub mod motion;

pub use analyzer::{Analyzer, ArmSwitch, LumaPlane};
pub use cooldown::Cooldown;
pub use motion::{MotionDetector, MotionEvent};
