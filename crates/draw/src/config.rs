use domino_protocol::{BLE_WRITE_LEN, MIN_FRAGMENT_LEN};

pub struct ConfigBuilder {
    min_fragment_len: usize,
    max_fragment_len: usize,
    degrees_per_us: f32,
    sharp_turn_below_mm: u32,
    sharp_turn_gain: f32,
    short_turn_below_mm: u32,
    short_turn_gain: f32,
    status_interval_ms: u64,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self {
            min_fragment_len: MIN_FRAGMENT_LEN,
            max_fragment_len: BLE_WRITE_LEN,
            // 90 degrees over 5 seconds at max turn rate
            degrees_per_us: 1.0 / 5_000_000.0,
            sharp_turn_below_mm: 5,
            sharp_turn_gain: 3.0,
            short_turn_below_mm: 10,
            short_turn_gain: 2.0,
            status_interval_ms: 1000,
        }
    }
}

impl ConfigBuilder {
    pub fn build(&self) -> DrawConfig {
        DrawConfig {
            min_fragment_len: self.min_fragment_len,
            max_fragment_len: self.max_fragment_len.max(self.min_fragment_len),
            degrees_per_us: self.degrees_per_us,
            sharp_turn_below_mm: self.sharp_turn_below_mm,
            sharp_turn_gain: self.sharp_turn_gain,
            short_turn_below_mm: self.short_turn_below_mm.max(self.sharp_turn_below_mm),
            short_turn_gain: self.short_turn_gain,
            status_interval_ms: self.status_interval_ms,
        }
    }

    pub fn with_fragment_len(&mut self, min: usize, max: usize) -> &mut Self {
        self.min_fragment_len = min;
        self.max_fragment_len = max;
        self
    }

    pub fn with_degrees_per_us(&mut self, degrees_per_us: f32) -> &mut Self {
        self.degrees_per_us = degrees_per_us;
        self
    }

    pub fn with_sharp_turn(&mut self, below_mm: u32, gain: f32) -> &mut Self {
        self.sharp_turn_below_mm = below_mm;
        self.sharp_turn_gain = gain;
        self
    }

    pub fn with_short_turn(&mut self, below_mm: u32, gain: f32) -> &mut Self {
        self.short_turn_below_mm = below_mm;
        self.short_turn_gain = gain;
        self
    }

    pub fn with_status_interval_ms(&mut self, ms: u64) -> &mut Self {
        self.status_interval_ms = ms;
        self
    }
}

/// Tuning knobs for the draw engine.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DrawConfig {
    /// Writes to the draw characteristic shorter than this are dropped.
    pub min_fragment_len: usize,
    /// Writes to the draw characteristic longer than this are dropped.
    pub max_fragment_len: usize,
    /// How many degrees the heading estimate moves per microsecond, per
    /// unit of turn rate.
    pub degrees_per_us: f32,
    /// When the next step threshold is below this many millimeters, the turn
    /// command is multiplied by `sharp_turn_gain`...
    pub sharp_turn_below_mm: u32,
    pub sharp_turn_gain: f32,
    /// ...and otherwise, below this many it's multiplied by `short_turn_gain`.
    pub short_turn_below_mm: u32,
    pub short_turn_gain: f32,
    /// How often the status record is pushed to a connected client.
    pub status_interval_ms: u64,
}

impl Default for DrawConfig {
    fn default() -> Self {
        ConfigBuilder::default().build()
    }
}
