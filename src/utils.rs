use chrono::{NaiveDate, NaiveTime};

/// Field-level parse result; the caller attaches the header path.
pub type FieldResult<T> = std::result::Result<T, String>;

/// 解析 `fs[/counterfreq[(base)]]`
pub fn parse_frequency_field(s: &str) -> FieldResult<(f64, Option<f64>, Option<f64>)> {
    let s = s.trim();
    let (fs_part, counter_part) = match s.split_once('/') {
        Some((fs, rest)) => (fs, Some(rest)),
        None => (s, None),
    };

    let fs = parse_f64(fs_part, "sampling frequency")?;
    if fs <= 0.0 {
        return Err(format!("sampling frequency must be positive, got {}", fs));
    }

    let (counter, base) = match counter_part {
        None => (None, None),
        Some(rest) => {
            let (freq, base) = split_parenthesized(rest)?;
            let base = base.map(|b| parse_f64(b, "base counter")).transpose()?;
            (Some(parse_f64(freq, "counter frequency")?), base)
        }
    };

    Ok((fs, counter, base))
}

/// 解析 `format[xsamp][:skew][+offset]`
///
/// Returns `(format, samples_per_frame, skew, byte_offset)`.
pub fn parse_format_field(s: &str) -> FieldResult<(u16, u32, i64, u64)> {
    let s = s.trim();
    let (rest, offset) = match s.split_once('+') {
        Some((head, off)) => (head, parse_int::<u64>(off, "byte offset")?),
        None => (s, 0),
    };
    let (rest, skew) = match rest.split_once(':') {
        Some((head, sk)) => (head, parse_int::<i64>(sk, "skew")?),
        None => (rest, 0),
    };
    let (fmt, spf) = match rest.split_once('x') {
        Some((head, n)) => (head, parse_int::<u32>(n, "samples per frame")?),
        None => (rest, 1),
    };

    Ok((parse_int::<u16>(fmt, "format")?, spf, skew, offset))
}

/// 解析 `gain[(baseline)][/units]`
///
/// Returns `(gain, baseline, units)`; missing parts are `None`.
pub fn parse_gain_field(s: &str) -> FieldResult<(f64, Option<i32>, Option<String>)> {
    let s = s.trim();
    let (rest, units) = match s.split_once('/') {
        Some((head, u)) => (head, Some(u.to_string())),
        None => (s, None),
    };
    let (gain, baseline) = split_parenthesized(rest)?;
    let baseline = baseline.map(|b| parse_int::<i32>(b, "baseline")).transpose()?;

    Ok((parse_f64(gain, "gain")?, baseline, units))
}

/// 解析 `hh:mm:ss[.fff]`，也接受 `mm:ss` 和 `ss`
pub fn parse_base_time(s: &str) -> FieldResult<NaiveTime> {
    let parts: Vec<&str> = s.trim().split(':').collect();
    let (h, m, sec) = match parts.as_slice() {
        [h, m, sec] => (*h, *m, *sec),
        [m, sec] => ("0", *m, *sec),
        [sec] => ("0", "0", *sec),
        _ => return Err(format!("invalid base time '{}'", s)),
    };

    let hour = parse_int::<u32>(h, "hour")?;
    let minute = parse_int::<u32>(m, "minute")?;
    let seconds = parse_f64(sec, "second")?;
    if seconds < 0.0 {
        return Err(format!("invalid base time '{}'", s));
    }
    let whole = seconds.trunc() as u32;
    let milli = ((seconds - seconds.trunc()) * 1000.0).round() as u32;

    NaiveTime::from_hms_milli_opt(hour, minute, whole, milli.min(999))
        .ok_or_else(|| format!("invalid base time '{}'", s))
}

/// 解析 `dd/mm/yyyy`
pub fn parse_base_date(s: &str) -> FieldResult<NaiveDate> {
    let parts: Vec<&str> = s.trim().split('/').collect();
    if parts.len() != 3 {
        return Err(format!("invalid base date '{}'", s));
    }

    let day = parse_int::<u32>(parts[0], "day")?;
    let month = parse_int::<u32>(parts[1], "month")?;
    let year = parse_int::<i32>(parts[2], "year")?;

    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| format!("invalid base date '{}'", s))
}

/// Splits `value(inner)` into `("value", Some("inner"))`.
fn split_parenthesized(s: &str) -> FieldResult<(&str, Option<&str>)> {
    match s.find('(') {
        None => Ok((s, None)),
        Some(open) => {
            let close = s[open..]
                .find(')')
                .map(|i| open + i)
                .ok_or_else(|| format!("unclosed parenthesis in '{}'", s))?;
            Ok((&s[..open], Some(&s[open + 1..close])))
        }
    }
}

fn parse_f64(s: &str, what: &str) -> FieldResult<f64> {
    s.trim()
        .parse::<f64>()
        .map_err(|_| format!("invalid {} '{}'", what, s))
}

fn parse_int<T: std::str::FromStr>(s: &str, what: &str) -> FieldResult<T> {
    s.trim()
        .parse::<T>()
        .map_err(|_| format!("invalid {} '{}'", what, s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frequency_field() {
        assert_eq!(parse_frequency_field("1000").unwrap(), (1000.0, None, None));
        assert_eq!(
            parse_frequency_field("360/720(12)").unwrap(),
            (360.0, Some(720.0), Some(12.0))
        );
        assert!(parse_frequency_field("0").is_err());
        assert!(parse_frequency_field("fast").is_err());
    }

    #[test]
    fn test_parse_format_field() {
        assert_eq!(parse_format_field("16").unwrap(), (16, 1, 0, 0));
        assert_eq!(parse_format_field("212x2:3+24").unwrap(), (212, 2, 3, 24));
        assert_eq!(parse_format_field("16+512").unwrap(), (16, 1, 0, 512));
    }

    #[test]
    fn test_parse_gain_field() {
        assert_eq!(
            parse_gain_field("2000(0)/mV").unwrap(),
            (2000.0, Some(0), Some("mV".to_string()))
        );
        assert_eq!(parse_gain_field("200").unwrap(), (200.0, None, None));
        assert_eq!(
            parse_gain_field("100(-1024)").unwrap(),
            (100.0, Some(-1024), None)
        );
        assert!(parse_gain_field("200(0/mV").is_err());
    }

    #[test]
    fn test_parse_base_time_and_date() {
        assert_eq!(
            parse_base_time("10:23:05").unwrap(),
            NaiveTime::from_hms_opt(10, 23, 5).unwrap()
        );
        assert_eq!(
            parse_base_time("1:30.5").unwrap(),
            NaiveTime::from_hms_milli_opt(0, 1, 30, 500).unwrap()
        );
        assert_eq!(
            parse_base_date("01/10/1990").unwrap(),
            NaiveDate::from_ymd_opt(1990, 10, 1).unwrap()
        );
        assert!(parse_base_date("1990-10-01").is_err());
    }
}
