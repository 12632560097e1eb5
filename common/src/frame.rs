/// Fixed geometry of the raw grayscale bitmap path. Header width/height bytes are ignored.
pub const RAW_WIDTH: usize = 160;
pub const RAW_HEIGHT: usize = 120;
pub const RAW_PAYLOAD_LEN: usize = RAW_WIDTH * RAW_HEIGHT;

/// Raw bitmap header: `AA 04 21 <W> <H> <reserved> <reserved>`.
pub const RAW_MAGIC: [u8; 3] = [0xAA, 0x04, 0x21];
pub const RAW_HEADER_LEN: usize = 7;
pub const RAW_FRAME_LEN: usize = RAW_HEADER_LEN + RAW_PAYLOAD_LEN;

pub const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];
pub const JPEG_EOI: [u8; 2] = [0xFF, 0xD9];

/// One unit recovered from the peripheral byte stream.
#[derive(Debug, Clone, PartialEq)]
pub enum RawFrame {
    /// ASCII line, trimmed, line terminator removed.
    TextLine(String),
    /// SOI..EOI inclusive.
    JpegImage(Vec<u8>),
    RawBitmap(RawBitmap),
}

impl RawFrame {
    pub fn kind(&self) -> &'static str {
        match self {
            RawFrame::TextLine(_) => "text",
            RawFrame::JpegImage(_) => "jpeg",
            RawFrame::RawBitmap(_) => "bitmap",
        }
    }
}

/// A 160x120 grayscale frame, one byte per pixel, row-major.
#[derive(Clone, PartialEq)]
pub struct RawBitmap {
    luma: Vec<u8>,
}

impl RawBitmap {
    /// Returns `None` unless `luma` holds exactly one frame's worth of pixels.
    pub fn from_luma(luma: Vec<u8>) -> Option<Self> {
        (luma.len() == RAW_PAYLOAD_LEN).then_some(Self { luma })
    }

    pub fn width(&self) -> usize {
        RAW_WIDTH
    }

    pub fn height(&self) -> usize {
        RAW_HEIGHT
    }

    pub fn luma(&self) -> &[u8] {
        &self.luma
    }

    pub fn into_luma(self) -> Vec<u8> {
        self.luma
    }

    /// Opaque ARGB expansion of pixel `index`: `0xFF000000 | g<<16 | g<<8 | g`.
    pub fn pixel(&self, index: usize) -> Option<u32> {
        self.luma.get(index).map(|&g| gray_to_argb(g))
    }

    pub fn to_argb(&self) -> Vec<u32> {
        self.luma.iter().map(|&g| gray_to_argb(g)).collect()
    }
}

impl std::fmt::Debug for RawBitmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawBitmap")
            .field("width", &RAW_WIDTH)
            .field("height", &RAW_HEIGHT)
            .field("bytes", &self.luma.len())
            .finish()
    }
}

fn gray_to_argb(g: u8) -> u32 {
    let g = g as u32;
    0xFF00_0000 | (g << 16) | (g << 8) | g
}

/// Combined `ENV:` report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvReading {
    pub temperature: f32,
    pub humidity: f32,
    pub sound_percent: u8,
    pub light_percent: u8,
}

/// A decoded telemetry line.
#[derive(Debug, Clone, PartialEq)]
pub enum SensorReading {
    Env(EnvReading),
    Climate { temperature: f32, humidity: f32 },
    /// `raw` is absent for the short `SOUND=<p>%` form.
    Sound { raw: Option<u32>, percent: u8 },
    Light { raw: u32, percent: u8 },
    /// Free text from the peripheral ("ALARM ON", "SYSTEM OFF ...").
    Message(String),
}

impl SensorReading {
    /// Status messages worth surfacing to the operator.
    pub fn is_notable(&self) -> bool {
        match self {
            SensorReading::Message(text) => {
                text.contains("SYSTEM") || text.contains("ALARM") || text.contains("ERROR")
            }
            _ => false,
        }
    }

    /// Sound level carried by this reading, if any.
    pub fn sound_percent(&self) -> Option<u8> {
        match self {
            SensorReading::Env(env) => Some(env.sound_percent),
            SensorReading::Sound { percent, .. } => Some(*percent),
            _ => None,
        }
    }
}
