//! Peripheral link: turns the raw SPP byte stream into typed frames.

pub mod accumulator;
pub mod demux;
pub mod session;
pub mod telemetry;
pub mod transport;

pub use accumulator::ByteAccumulator;
pub use demux::StreamDemultiplexer;
pub use session::{LinkError, LinkEvent, LinkHandle, LinkSession};
pub use telemetry::TelemetryLineDecoder;
