use chrono::{NaiveDate, NaiveTime};

/// WFDB 默认增益（每物理单位的ADC单位数）
pub const DEFAULT_GAIN: f64 = 200.0;

/// WFDB 默认采样频率
pub const DEFAULT_SAMPLING_FREQUENCY: f64 = 250.0;

/// One signal line of a WFDB header.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalSpec {
    pub file_name: String,
    pub format: u16,
    pub samples_per_frame: u32,
    pub skew: i64,
    pub byte_offset: u64,
    pub gain: f64,
    pub baseline: i32,
    pub units: String,
    pub adc_resolution: u32,
    pub adc_zero: i32,
    pub initial_value: i32,
    pub checksum: i32,
    pub block_size: u32,
    /// Channel name, e.g. `i`, `v1`, `vx`.
    pub description: String,
}

impl SignalSpec {
    /// A format-16 signal stored in `file_name` with the given gain and units.
    pub fn new(file_name: &str, description: &str, gain: f64, units: &str) -> Self {
        SignalSpec {
            file_name: file_name.to_string(),
            format: 16,
            samples_per_frame: 1,
            skew: 0,
            byte_offset: 0,
            gain,
            baseline: 0,
            units: units.to_string(),
            adc_resolution: 16,
            adc_zero: 0,
            initial_value: 0,
            checksum: 0,
            block_size: 0,
            description: description.to_string(),
        }
    }

    /// 0 表示未校准，按默认增益处理
    pub fn effective_gain(&self) -> f64 {
        if self.gain == 0.0 {
            DEFAULT_GAIN
        } else {
            self.gain
        }
    }

    /// 将数字值转换为物理值
    pub fn to_physical(&self, digital_value: i32) -> f64 {
        (digital_value - self.baseline) as f64 / self.effective_gain()
    }

    /// 将物理值转换为数字值
    pub fn to_digital(&self, physical_value: f64) -> i32 {
        (physical_value * self.effective_gain() + self.baseline as f64).round() as i32
    }
}

/// Parsed contents of a `.hea` file.
#[derive(Debug, Clone)]
pub struct RecordHeader {
    pub record_name: String,
    pub sampling_frequency: f64,
    pub counter_frequency: Option<f64>,
    pub base_counter: Option<f64>,
    /// Samples per signal. `None` when the header omits it.
    pub signal_length: Option<usize>,
    pub base_time: Option<NaiveTime>,
    pub base_date: Option<NaiveDate>,
    pub signals: Vec<SignalSpec>,
    /// `#` comment lines, trimmed of `#` and blanks.
    pub comments: Vec<String>,
}

impl RecordHeader {
    pub fn num_signals(&self) -> usize {
        self.signals.len()
    }

    pub fn channel_names(&self) -> Vec<String> {
        self.signals.iter().map(|s| s.description.clone()).collect()
    }
}
