use std::fs::{self, File};
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use ndarray::{Array2, Axis};

use crate::error::{EcgError, Result};
use crate::types::{RecordHeader, SignalSpec, DEFAULT_SAMPLING_FREQUENCY};
use crate::utils::{
    parse_base_date, parse_base_time, parse_format_field, parse_frequency_field, parse_gain_field,
};

/// WFDB record reader
///
/// A WFDB record is a text header (`<name>.hea`) describing one or more
/// signals, plus binary signal files the header points to. `RecordReader`
/// parses the header on open and reads the signal data on demand.
///
/// Record names may be path-like (`patient001/s0010_re`); the header is
/// looked up relative to the database directory and signal files relative
/// to the header.
///
/// # Examples
///
/// ```rust
/// use ecgwin::RecordReader;
///
/// # let dir = std::env::temp_dir().join("ecgwin_doc_reader");
/// # ecgwin::doctest_utils::create_test_record(&dir, "patient001/s0001_re", "Healthy control", 4096)?;
/// let reader = RecordReader::open(&dir, "patient001/s0001_re")?;
///
/// println!("Signals: {}", reader.header().num_signals());
/// println!("Sampling frequency: {} Hz", reader.header().sampling_frequency);
///
/// // channels × samples, in physical units
/// let signal = reader.read_physical()?;
/// assert_eq!(signal.nrows(), reader.header().num_signals());
/// assert_eq!(signal.ncols(), 4096);
///
/// # std::fs::remove_dir_all(&dir).ok();
/// # Ok::<(), ecgwin::EcgError>(())
/// ```
#[derive(Debug, Clone)]
pub struct RecordReader {
    name: String,
    header: RecordHeader,
    header_path: PathBuf,
    /// 信号文件所在目录
    signal_dir: PathBuf,
}

/// Signals sharing one data file, in header order.
struct FileGroup<'a> {
    file_name: &'a str,
    format: u16,
    byte_offset: u64,
    indices: Vec<usize>,
}

impl RecordReader {
    /// Opens the record `record_name` inside `db_dir` and parses its header.
    ///
    /// # Errors
    ///
    /// * `EcgError::FileNotFound` - The `.hea` file is missing or unreadable
    /// * `EcgError::InvalidHeader` - The header is malformed
    pub fn open<P: AsRef<Path>>(db_dir: P, record_name: &str) -> Result<Self> {
        let header_path = db_dir.as_ref().join(format!("{}.hea", record_name));
        let text = fs::read_to_string(&header_path)
            .map_err(|e| EcgError::FileNotFound(format!("{}: {}", header_path.display(), e)))?;

        let header = parse_header(&text, &header_path.display().to_string())?;
        let signal_dir = header_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        Ok(RecordReader {
            name: record_name.to_string(),
            header,
            header_path,
            signal_dir,
        })
    }

    /// The record name this reader was opened with.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn header(&self) -> &RecordHeader {
        &self.header
    }

    pub fn header_path(&self) -> &Path {
        &self.header_path
    }

    /// Header comment lines, trimmed of `#` and surrounding blanks.
    pub fn comments(&self) -> &[String] {
        &self.header.comments
    }

    pub fn channel_names(&self) -> Vec<String> {
        self.header.channel_names()
    }

    /// Samples per signal.
    ///
    /// Taken from the header when present, otherwise derived from the size
    /// of the first signal file.
    pub fn signal_length(&self) -> Result<usize> {
        if let Some(len) = self.header.signal_length {
            return Ok(len);
        }

        let groups = self.file_groups()?;
        match groups.first() {
            Some(group) => self.length_from_file(group),
            None => Ok(0),
        }
    }

    /// Reads all signals as raw ADC values, shaped channels × samples.
    ///
    /// # Errors
    ///
    /// * `EcgError::UnsupportedFormat` - A signal uses a storage format other than 16, 80 or 212
    /// * `EcgError::ShapeMismatch` - A signal file holds fewer samples than the header declares
    pub fn read_digital(&self) -> Result<Array2<i32>> {
        let length = self.signal_length()?;
        let mut out = Array2::<i32>::zeros((self.header.num_signals(), length));

        for group in self.file_groups()? {
            let frame = group.indices.len();
            let values = self.read_group(&group, length)?;

            // 按帧交错存储：每帧依次包含该文件中每个信号的一个样本
            for (j, &signal) in group.indices.iter().enumerate() {
                let mut row = out.row_mut(signal);
                for (t, slot) in row.iter_mut().enumerate() {
                    *slot = values[t * frame + j];
                }
            }
        }

        Ok(out)
    }

    /// Reads all signals in physical units, shaped channels × samples.
    pub fn read_physical(&self) -> Result<Array2<f64>> {
        let digital = self.read_digital()?;
        let signals = &self.header.signals;

        Ok(Array2::from_shape_fn(digital.dim(), |(c, t)| {
            signals[c].to_physical(digital[[c, t]])
        }))
    }

    /// Reads the named channels in physical units, in the order given.
    ///
    /// # Errors
    ///
    /// * `EcgError::MissingChannel` - A requested channel is not in the header
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ecgwin::RecordReader;
    ///
    /// # let dir = std::env::temp_dir().join("ecgwin_doc_read_signals");
    /// # ecgwin::doctest_utils::create_test_record(&dir, "patient002/s0002_re", "Myocardial infarction", 2048)?;
    /// let reader = RecordReader::open(&dir, "patient002/s0002_re")?;
    ///
    /// // Reverse the channel order
    /// let mut channels = reader.channel_names();
    /// channels.reverse();
    ///
    /// let signal = reader.read_signals(&channels)?;
    /// let all = reader.read_physical()?;
    /// assert_eq!(signal.row(0), all.row(all.nrows() - 1));
    ///
    /// # std::fs::remove_dir_all(&dir).ok();
    /// # Ok::<(), ecgwin::EcgError>(())
    /// ```
    pub fn read_signals(&self, channel_names: &[String]) -> Result<Array2<f64>> {
        let available = self.header.channel_names();
        let indices = channel_names
            .iter()
            .map(|wanted| {
                available
                    .iter()
                    .position(|name| name == wanted)
                    .ok_or_else(|| EcgError::MissingChannel {
                        record: self.name.clone(),
                        channel: wanted.clone(),
                    })
            })
            .collect::<Result<Vec<usize>>>()?;

        let physical = self.read_physical()?;
        Ok(physical.select(Axis(0), &indices))
    }

    fn file_groups(&self) -> Result<Vec<FileGroup<'_>>> {
        let mut groups: Vec<FileGroup<'_>> = Vec::new();

        for (i, spec) in self.header.signals.iter().enumerate() {
            if spec.samples_per_frame != 1 {
                return Err(self.invalid("multi-sample frames are not supported"));
            }

            match groups.iter_mut().find(|g| g.file_name == spec.file_name) {
                Some(group) => {
                    if group.format != spec.format {
                        return Err(self.invalid("signals in one file must share a format"));
                    }
                    group.indices.push(i);
                }
                None => groups.push(FileGroup {
                    file_name: &spec.file_name,
                    format: spec.format,
                    byte_offset: spec.byte_offset,
                    indices: vec![i],
                }),
            }
        }

        Ok(groups)
    }

    fn length_from_file(&self, group: &FileGroup<'_>) -> Result<usize> {
        let path = self.signal_dir.join(group.file_name);
        let bytes = fs::metadata(&path)
            .map_err(|e| EcgError::FileNotFound(format!("{}: {}", path.display(), e)))?
            .len()
            .saturating_sub(group.byte_offset) as usize;

        let values = match group.format {
            16 => bytes / 2,
            80 => bytes,
            212 => bytes * 2 / 3,
            other => return Err(EcgError::UnsupportedFormat(other)),
        };

        Ok(values / group.indices.len())
    }

    /// Reads `length` frames of interleaved values from one signal file.
    fn read_group(&self, group: &FileGroup<'_>, length: usize) -> Result<Vec<i32>> {
        let count = length * group.indices.len();
        let needed = match group.format {
            16 => count * 2,
            80 => count,
            212 => (count * 3 + 1) / 2,
            other => return Err(EcgError::UnsupportedFormat(other)),
        };

        let path = self.signal_dir.join(group.file_name);
        let file = File::open(&path)
            .map_err(|e| EcgError::FileNotFound(format!("{}: {}", path.display(), e)))?;
        let mut reader = BufReader::new(file);
        reader.seek(SeekFrom::Start(group.byte_offset))?;

        let mut bytes = Vec::with_capacity(needed);
        reader.take(needed as u64).read_to_end(&mut bytes)?;

        if bytes.len() < needed {
            let available = match group.format {
                16 => bytes.len() / 2,
                80 => bytes.len(),
                _ => bytes.len() * 2 / 3,
            } / group.indices.len();
            return Err(EcgError::ShapeMismatch {
                record: self.name.clone(),
                expected: length,
                actual: available,
            });
        }

        log::debug!(
            "{}: read {} bytes from {} (format {})",
            self.name,
            bytes.len(),
            group.file_name,
            group.format
        );

        decode_samples(group.format, &bytes, count)
    }

    fn invalid(&self, reason: &str) -> EcgError {
        EcgError::InvalidHeader {
            path: self.header_path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Parses the text of a `.hea` file.
///
/// `path` is only used in error messages.
///
/// # Examples
///
/// ```rust
/// use ecgwin::reader::parse_header;
///
/// let text = "s0010_re 2 1000 38400\n\
///             s0010_re.dat 16 2000 16 0 -489 -8337 0 i\n\
///             s0010_re.dat 16 2000(0)/mV 16 0 -458 -23342 0 ii\n\
///             ## Reason for admission: Myocardial infarction\n";
///
/// let header = parse_header(text, "s0010_re.hea")?;
/// assert_eq!(header.num_signals(), 2);
/// assert_eq!(header.signal_length, Some(38400));
/// assert_eq!(header.channel_names(), vec!["i", "ii"]);
/// assert_eq!(header.comments[0], "Reason for admission: Myocardial infarction");
/// # Ok::<(), ecgwin::EcgError>(())
/// ```
pub fn parse_header(text: &str, path: &str) -> Result<RecordHeader> {
    let invalid = |reason: String| EcgError::InvalidHeader {
        path: path.to_string(),
        reason,
    };

    let mut comments = Vec::new();
    let mut lines = Vec::new();
    for raw in text.lines() {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.starts_with('#') {
            comments.push(trimmed.trim_matches(|c: char| c == '#' || c == ' ' || c == '\t').to_string());
        } else {
            lines.push(trimmed);
        }
    }

    let record_line = lines
        .first()
        .ok_or_else(|| invalid("missing record line".to_string()))?;
    let fields: Vec<&str> = record_line.split_whitespace().collect();
    if fields.len() < 2 {
        return Err(invalid(format!("record line too short: '{}'", record_line)));
    }

    let record_name = fields[0];
    if record_name.contains('/') {
        return Err(invalid("multi-segment records are not supported".to_string()));
    }

    let num_signals: usize = fields[1]
        .parse()
        .map_err(|_| invalid(format!("invalid signal count '{}'", fields[1])))?;

    let (sampling_frequency, counter_frequency, base_counter) = match fields.get(2) {
        Some(f) => parse_frequency_field(f).map_err(&invalid)?,
        None => (DEFAULT_SAMPLING_FREQUENCY, None, None),
    };

    let signal_length = fields
        .get(3)
        .map(|n| {
            n.parse::<usize>()
                .map_err(|_| invalid(format!("invalid sample count '{}'", n)))
        })
        .transpose()?;

    let base_time = fields
        .get(4)
        .map(|t| parse_base_time(t))
        .transpose()
        .map_err(&invalid)?;
    let base_date = fields
        .get(5)
        .map(|d| parse_base_date(d))
        .transpose()
        .map_err(&invalid)?;

    if lines.len() - 1 < num_signals {
        return Err(invalid(format!(
            "expected {} signal lines, found {}",
            num_signals,
            lines.len() - 1
        )));
    }

    let signals = lines[1..=num_signals]
        .iter()
        .map(|line| parse_signal_line(line).map_err(&invalid))
        .collect::<Result<Vec<SignalSpec>>>()?;

    Ok(RecordHeader {
        record_name: record_name.to_string(),
        sampling_frequency,
        counter_frequency,
        base_counter,
        signal_length,
        base_time,
        base_date,
        signals,
        comments,
    })
}

/// 解析单个信号行
fn parse_signal_line(line: &str) -> std::result::Result<SignalSpec, String> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 2 {
        return Err(format!("signal line too short: '{}'", line));
    }

    let (format, samples_per_frame, skew, byte_offset) = parse_format_field(fields[1])?;
    let (gain, baseline, units) = match fields.get(2) {
        Some(g) => parse_gain_field(g)?,
        None => (0.0, None, None),
    };

    let int_field = |idx: usize, name: &str| -> std::result::Result<Option<i64>, String> {
        fields
            .get(idx)
            .map(|v| v.parse::<i64>().map_err(|_| format!("invalid {} '{}'", name, v)))
            .transpose()
    };

    let unsigned_field = |idx: usize, name: &str| -> std::result::Result<Option<u32>, String> {
        fields
            .get(idx)
            .map(|v| v.parse::<u32>().map_err(|_| format!("invalid {} '{}'", name, v)))
            .transpose()
    };

    let adc_resolution = unsigned_field(3, "ADC resolution")?
        .unwrap_or(match format {
            80 => 8,
            212 => 12,
            _ => 16,
        });
    let adc_zero = int_field(4, "ADC zero")?.unwrap_or(0) as i32;
    let initial_value = int_field(5, "initial value")?.unwrap_or(0) as i32;
    let checksum = int_field(6, "checksum")?.unwrap_or(0) as i32;
    let block_size = unsigned_field(7, "block size")?.unwrap_or(0);
    let description = fields.get(8..).map(|d| d.join(" ")).unwrap_or_default();

    Ok(SignalSpec {
        file_name: fields[0].to_string(),
        format,
        samples_per_frame,
        skew,
        byte_offset,
        gain,
        // 缺省基线等于 ADC 零点
        baseline: baseline.unwrap_or(adc_zero),
        units: units.unwrap_or_else(|| "mV".to_string()),
        adc_resolution,
        adc_zero,
        initial_value,
        checksum,
        block_size,
        description,
    })
}

/// Decodes `count` samples stored in `format`.
pub fn decode_samples(format: u16, bytes: &[u8], count: usize) -> Result<Vec<i32>> {
    let mut values = Vec::with_capacity(count);

    match format {
        16 => {
            for pair in bytes.chunks_exact(2).take(count) {
                values.push(i16::from_le_bytes([pair[0], pair[1]]) as i32);
            }
        }
        80 => {
            values.extend(bytes.iter().take(count).map(|&b| b as i32 - 128));
        }
        212 => {
            // 每3个字节打包两个12位样本
            for chunk in bytes.chunks(3) {
                if values.len() >= count {
                    break;
                }
                let b1 = *chunk.get(1).unwrap_or(&0) as i32;
                values.push(sign_extend_12(chunk[0] as i32 | ((b1 & 0x0f) << 8)));
                if values.len() < count {
                    if let Some(&b2) = chunk.get(2) {
                        values.push(sign_extend_12(b2 as i32 | ((b1 & 0xf0) << 4)));
                    }
                }
            }
        }
        other => return Err(EcgError::UnsupportedFormat(other)),
    }

    Ok(values)
}

fn sign_extend_12(v: i32) -> i32 {
    if v > 2047 {
        v - 4096
    } else {
        v
    }
}
