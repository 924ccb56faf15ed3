//! Rainbow color quantization.
//!
//! Colors are packed as `red + green * 256 + blue * 65536`, the layout a
//! host "object id" color input expects.

/// Number of buckets in one full hue cycle (six 256-wide segments).
pub const HUE_CYCLE: i64 = 1536;

const SEGMENT: i64 = 256;
const FULL: u8 = u8::MAX;

/// Channel byte offsets within a packed color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Red,
    Green,
    Blue,
}

impl Channel {
    /// Multiplier applied to a channel byte when packing.
    pub fn factor(self) -> u32 {
        match self {
            Channel::Red => 1,
            Channel::Green => 256,
            Channel::Blue => 65536,
        }
    }
}

/// Precomputed per-channel contribution of every byte value.
#[derive(Debug, Clone)]
pub struct ColorPalette {
    red: [u32; 256],
    green: [u32; 256],
    blue: [u32; 256],
}

impl ColorPalette {
    pub fn new() -> Self {
        Self {
            red: channel_table(Channel::Red),
            green: channel_table(Channel::Green),
            blue: channel_table(Channel::Blue),
        }
    }

    pub fn contribution(&self, channel: Channel, byte: u8) -> u32 {
        match channel {
            Channel::Red => self.red[byte as usize],
            Channel::Green => self.green[byte as usize],
            Channel::Blue => self.blue[byte as usize],
        }
    }

    pub fn rgb(&self, red: u8, green: u8, blue: u8) -> u32 {
        self.red[red as usize] + self.green[green as usize] + self.blue[blue as usize]
    }
}

impl Default for ColorPalette {
    fn default() -> Self {
        Self::new()
    }
}

fn channel_table(channel: Channel) -> [u32; 256] {
    let factor = channel.factor();
    let mut table = [0u32; 256];
    for (byte, entry) in table.iter_mut().enumerate() {
        *entry = byte as u32 * factor;
    }
    table
}

/// Packs three channel bytes without a palette.
pub fn pack(red: u8, green: u8, blue: u8) -> u32 {
    red as u32 + green as u32 * 256 + blue as u32 * 65536
}

/// Splits a packed color back into `[red, green, blue]`.
pub fn unpack(packed: u32) -> [u8; 3] {
    [
        (packed & 0xff) as u8,
        ((packed >> 8) & 0xff) as u8,
        ((packed >> 16) & 0xff) as u8,
    ]
}

/// Maps an integer height bucket onto a six-segment hue cycle.
///
/// The bucket is reduced with a Euclidean remainder, so negative buckets wrap
/// into `[0, 1536)` instead of producing a negative segment index. This keeps
/// `eval(v) == eval(v + 1536 * k)` for every integer `k`.
#[derive(Debug, Clone, Default)]
pub struct RainbowColorMapper {
    palette: ColorPalette,
}

impl RainbowColorMapper {
    pub fn new() -> Self {
        Self {
            palette: ColorPalette::new(),
        }
    }

    pub fn palette(&self) -> &ColorPalette {
        &self.palette
    }

    pub fn eval(&self, value: i64) -> u32 {
        let reduced = value.rem_euclid(HUE_CYCLE);
        // In range 0..256 by construction.
        let current = reduced.rem_euclid(SEGMENT) as u8;
        let rising = current;
        let falling = FULL - current;

        let (red, green, blue) = match reduced / SEGMENT {
            0 => (FULL, rising, 0),
            1 => (falling, FULL, 0),
            2 => (0, FULL, rising),
            3 => (0, falling, FULL),
            4 => (rising, 0, FULL),
            _ => (FULL, 0, falling),
        };
        self.palette.rgb(red, green, blue)
    }
}
