use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveTime};

use crate::error::{EcgError, Result};
use crate::types::SignalSpec;

/// WFDB record writer (format 16)
///
/// Writes a record as a `.dat` file of interleaved 16-bit little-endian
/// samples and a `.hea` header describing it. Samples may be written in
/// several chunks; the header is produced by [`finalize`](Self::finalize)
/// once the total length, initial values and checksums are known.
///
/// Used to build synthetic databases for tests and to export derived
/// records.
///
/// # Examples
///
/// ```rust
/// use ecgwin::{RecordReader, RecordWriter, SignalSpec};
///
/// let dir = std::env::temp_dir().join("ecgwin_doc_writer");
///
/// let mut writer = RecordWriter::create(&dir, "patient007/s0100_re")?;
/// writer.set_sampling_frequency(1000.0)?;
/// writer.add_signal(SignalSpec::new("s0100_re.dat", "i", 2000.0, "mV"))?;
/// writer.add_signal(SignalSpec::new("s0100_re.dat", "ii", 2000.0, "mV"))?;
/// writer.add_comment("Reason for admission: Healthy control");
///
/// let lead_i: Vec<f64> = (0..1000).map(|t| (t as f64 / 100.0).sin()).collect();
/// let lead_ii: Vec<f64> = (0..1000).map(|t| (t as f64 / 100.0).cos()).collect();
/// writer.write_samples(&[lead_i, lead_ii])?;
/// writer.finalize()?;
///
/// let reader = RecordReader::open(&dir, "patient007/s0100_re")?;
/// assert_eq!(reader.signal_length()?, 1000);
/// assert_eq!(reader.channel_names(), vec!["i", "ii"]);
///
/// # std::fs::remove_dir_all(&dir).ok();
/// # Ok::<(), ecgwin::EcgError>(())
/// ```
pub struct RecordWriter {
    file: BufWriter<File>,
    header_path: PathBuf,
    record_name: String,
    sampling_frequency: f64,
    base_time: Option<NaiveTime>,
    base_date: Option<NaiveDate>,
    signals: Vec<SignalSpec>,
    comments: Vec<String>,
    samples_written: usize,
    /// 每个信号的校验和（累加后取16位）
    checksums: Vec<i64>,
}

impl RecordWriter {
    /// Creates the data file for `record_name` under `db_dir`.
    ///
    /// Intermediate directories of a path-like record name are created.
    ///
    /// # Errors
    ///
    /// * `EcgError::FileNotFound` - The data file cannot be created
    pub fn create<P: AsRef<Path>>(db_dir: P, record_name: &str) -> Result<Self> {
        let header_path = db_dir.as_ref().join(format!("{}.hea", record_name));
        if let Some(parent) = header_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let data_path = header_path.with_extension("dat");
        let file = File::create(&data_path)
            .map_err(|e| EcgError::FileNotFound(format!("{}: {}", data_path.display(), e)))?;

        let base_name = record_name
            .rsplit('/')
            .next()
            .unwrap_or(record_name)
            .to_string();

        Ok(RecordWriter {
            file: BufWriter::new(file),
            header_path,
            record_name: base_name,
            sampling_frequency: 1000.0,
            base_time: None,
            base_date: None,
            signals: Vec::new(),
            comments: Vec::new(),
            samples_written: 0,
            checksums: Vec::new(),
        })
    }

    /// Name of the data file signals of this record should reference.
    pub fn data_file_name(&self) -> String {
        format!("{}.dat", self.record_name)
    }

    pub fn set_sampling_frequency(&mut self, hz: f64) -> Result<()> {
        if hz <= 0.0 {
            return Err(EcgError::InvalidConfig(format!(
                "sampling frequency must be positive, got {}",
                hz
            )));
        }
        self.sampling_frequency = hz;
        Ok(())
    }

    pub fn set_base_datetime(&mut self, date: NaiveDate, time: NaiveTime) {
        self.base_date = Some(date);
        self.base_time = Some(time);
    }

    /// Adds a signal. Only format 16 in this writer's own data file is
    /// accepted, and only before any samples are written.
    pub fn add_signal(&mut self, mut signal: SignalSpec) -> Result<()> {
        if self.samples_written > 0 {
            return Err(EcgError::InvalidConfig(
                "cannot add a signal after writing samples".to_string(),
            ));
        }
        if signal.format != 16 {
            return Err(EcgError::UnsupportedFormat(signal.format));
        }

        signal.file_name = self.data_file_name();
        signal.byte_offset = 0;
        signal.samples_per_frame = 1;
        self.signals.push(signal);
        self.checksums.push(0);
        Ok(())
    }

    /// Adds a header comment line (written as `# <text>`).
    pub fn add_comment(&mut self, text: &str) {
        self.comments.push(text.to_string());
    }

    /// Appends samples, one `Vec` per signal in physical units.
    ///
    /// All channels must have the same length. Values outside the 16-bit
    /// range are clamped.
    pub fn write_samples(&mut self, samples: &[Vec<f64>]) -> Result<()> {
        if samples.len() != self.signals.len() {
            return Err(EcgError::InvalidConfig(format!(
                "expected {} channels, got {}",
                self.signals.len(),
                samples.len()
            )));
        }

        let length = samples.first().map(Vec::len).unwrap_or(0);
        if samples.iter().any(|s| s.len() != length) {
            return Err(EcgError::InvalidConfig(
                "all channels must have the same number of samples".to_string(),
            ));
        }

        for t in 0..length {
            for (c, signal) in self.signals.iter_mut().enumerate() {
                let digital = signal
                    .to_digital(samples[c][t])
                    .clamp(i16::MIN as i32, i16::MAX as i32);

                if self.samples_written == 0 && t == 0 {
                    signal.initial_value = digital;
                }
                self.checksums[c] += digital as i64;

                self.file.write_all(&(digital as i16).to_le_bytes())?;
            }
        }

        self.samples_written += length;
        Ok(())
    }

    /// Flushes the data file and writes the header.
    pub fn finalize(mut self) -> Result<()> {
        self.file.flush()?;

        let mut header = String::new();
        header.push_str(&format!(
            "{} {} {} {}",
            self.record_name,
            self.signals.len(),
            self.sampling_frequency,
            self.samples_written
        ));
        if let Some(time) = self.base_time {
            header.push_str(&format!(" {}", time.format("%H:%M:%S")));
            if let Some(date) = self.base_date {
                header.push_str(&format!(" {}", date.format("%d/%m/%Y")));
            }
        }
        header.push('\n');

        for (signal, sum) in self.signals.iter().zip(&self.checksums) {
            // WFDB 校验和为16位有符号累加
            let checksum = (*sum as i16 as i64) as i32;
            header.push_str(&format!(
                "{} 16 {}({})/{} 16 {} {} {} 0 {}\n",
                signal.file_name,
                signal.gain,
                signal.baseline,
                signal.units,
                signal.adc_zero,
                signal.initial_value,
                checksum,
                signal.description
            ));
        }

        for comment in &self.comments {
            header.push_str(&format!("# {}\n", comment));
        }

        fs::write(&self.header_path, header)?;
        log::debug!(
            "wrote {} ({} signals, {} samples)",
            self.header_path.display(),
            self.signals.len(),
            self.samples_written
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::RecordReader;

    fn test_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("ecgwin_writer_{}", name))
    }

    #[test]
    fn test_add_signal_after_samples_rejected() {
        let dir = test_dir("late_signal");
        let mut writer = RecordWriter::create(&dir, "rec").unwrap();
        writer
            .add_signal(SignalSpec::new("rec.dat", "i", 200.0, "mV"))
            .unwrap();
        writer.write_samples(&[vec![0.0; 4]]).unwrap();

        let result = writer.add_signal(SignalSpec::new("rec.dat", "ii", 200.0, "mV"));
        assert!(result.is_err());
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_ragged_channels_rejected() {
        let dir = test_dir("ragged");
        let mut writer = RecordWriter::create(&dir, "rec").unwrap();
        writer
            .add_signal(SignalSpec::new("rec.dat", "i", 200.0, "mV"))
            .unwrap();
        writer
            .add_signal(SignalSpec::new("rec.dat", "ii", 200.0, "mV"))
            .unwrap();

        assert!(writer.write_samples(&[vec![0.0; 4], vec![0.0; 3]]).is_err());
        assert!(writer.write_samples(&[vec![0.0; 4]]).is_err());
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_chunked_write_round_trip() {
        let dir = test_dir("chunked");
        let mut writer = RecordWriter::create(&dir, "p1/rec").unwrap();
        writer.set_base_datetime(
            NaiveDate::from_ymd_opt(1990, 10, 1).unwrap(),
            NaiveTime::from_hms_opt(10, 23, 0).unwrap(),
        );
        writer
            .add_signal(SignalSpec::new("ignored.dat", "v1", 1000.0, "mV"))
            .unwrap();
        writer.add_comment("Reason for admission: Healthy control");

        writer.write_samples(&[vec![0.5, -0.25, 1.0]]).unwrap();
        writer.write_samples(&[vec![0.001, 40.0]]).unwrap();
        writer.finalize().unwrap();

        let reader = RecordReader::open(&dir, "p1/rec").unwrap();
        let header = reader.header();
        assert_eq!(header.signal_length, Some(5));
        assert_eq!(header.signals[0].file_name, "rec.dat");
        assert_eq!(header.signals[0].initial_value, 500);
        assert_eq!(
            header.base_date,
            Some(NaiveDate::from_ymd_opt(1990, 10, 1).unwrap())
        );
        assert_eq!(header.comments, vec!["Reason for admission: Healthy control"]);

        let digital = reader.read_digital().unwrap();
        // 40 mV × 1000 超出16位范围，被截断
        assert_eq!(digital.row(0).to_vec(), vec![500, -250, 1000, 1, 32767]);

        let checksum: i64 = digital.iter().map(|&d| d as i64).sum();
        assert_eq!(header.signals[0].checksum, checksum as i16 as i32);
        fs::remove_dir_all(&dir).ok();
    }
}
