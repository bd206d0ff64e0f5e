//! Literal rendering of values for string mode
//!
//! The crawling host stringifies every field with its own `str()` when
//! `convertallstrings` is on, so downstream readers expect exactly that text:
//! `False`, `None`, `['a', 'b']`, `2020-02-29 11:12:13+00:00`.

use chrono::{DateTime, Timelike, Utc};

use crate::record::Value;

/// Top-level rendering (`str(value)`): strings are emitted bare
pub fn render(value: &Value) -> String {
    match value {
        Value::Str(s) => s.clone(),
        Value::Timestamp(ts) => render_timestamp(ts),
        other => repr(other),
    }
}

/// Nested rendering (`repr(value)`): strings are quoted
pub fn repr(value: &Value) -> String {
    let mut out = String::new();
    write_repr(&mut out, value);
    out
}

fn write_repr(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("None"),
        Value::Bool(true) => out.push_str("True"),
        Value::Bool(false) => out.push_str("False"),
        Value::Int(i) => out.push_str(&i.to_string()),
        Value::Float(f) => out.push_str(&render_float(*f)),
        Value::Str(s) => write_quoted(out, s),
        Value::Timestamp(ts) => write_timestamp_repr(out, ts),
        Value::List(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_repr(out, item);
            }
            out.push(']');
        }
        Value::Map(entries) => {
            out.push('{');
            for (i, (key, item)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_quoted(out, key);
                out.push_str(": ");
                write_repr(out, item);
            }
            out.push('}');
        }
    }
}

fn write_quoted(out: &mut String, s: &str) {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if !is_printable(c) => write_escape(out, c),
            c => out.push(c),
        }
    }
    out.push(quote);
}

fn write_escape(out: &mut String, c: char) {
    let code = c as u32;
    if code <= 0xff {
        out.push_str(&format!("\\x{:02x}", code));
    } else if code <= 0xffff {
        out.push_str(&format!("\\u{:04x}", code));
    } else {
        out.push_str(&format!("\\U{:08x}", code));
    }
}

/// Characters the host prints unescaped inside a quoted string.
///
/// Controls, separators other than the ASCII space, format characters and
/// private-use code points are escaped. Unassigned code points are not
/// known here and pass through unchanged.
fn is_printable(c: char) -> bool {
    let code = c as u32;
    !matches!(
        code,
        0x00..=0x1f
            | 0x7f..=0xa0
            | 0xad
            | 0x600..=0x605
            | 0x61c
            | 0x6dd
            | 0x70f
            | 0x1680
            | 0x180e
            | 0x2000..=0x200f
            | 0x2028..=0x202f
            | 0x205f..=0x2064
            | 0x2066..=0x206f
            | 0x3000
            | 0xe000..=0xf8ff
            | 0xfeff
            | 0xfff9..=0xfffb
            | 0x110bd
            | 0x1d173..=0x1d17a
            | 0xe0001
            | 0xe0020..=0xe007f
            | 0xf0000..=0x10ffff
    )
}

/// `str(datetime)` for an aware UTC datetime
pub fn render_timestamp(ts: &DateTime<Utc>) -> String {
    if ts.nanosecond() / 1_000 == 0 {
        ts.format("%Y-%m-%d %H:%M:%S+00:00").to_string()
    } else {
        format!(
            "{}.{:06}+00:00",
            ts.format("%Y-%m-%d %H:%M:%S"),
            (ts.nanosecond() / 1_000) % 1_000_000
        )
    }
}

// Inside containers the host prints the constructor form
fn write_timestamp_repr(out: &mut String, ts: &DateTime<Utc>) {
    use chrono::Datelike;

    out.push_str(&format!(
        "datetime.datetime({}, {}, {}, {}, {}",
        ts.year(),
        ts.month(),
        ts.day(),
        ts.hour(),
        ts.minute()
    ));
    let micros = (ts.nanosecond() / 1_000) % 1_000_000;
    if ts.second() != 0 || micros != 0 {
        out.push_str(&format!(", {}", ts.second()));
    }
    if micros != 0 {
        out.push_str(&format!(", {}", micros));
    }
    out.push_str(", tzinfo=datetime.timezone.utc)");
}

/// Shortest round-trip float text, with fixed notation for exponents in
/// `-4..16` and `1e+16` style otherwise.
pub fn render_float(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    // `{:e}` yields the shortest round-trip digits, e.g. "-1.25e3"
    let sci = format!("{:e}", f);
    let (mantissa, exponent) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };
    let (negative, mantissa) = match mantissa.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, mantissa),
    };
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let sign = if negative { "-" } else { "" };

    if !(-4..16).contains(&exponent) {
        let mut body = digits[..1].to_string();
        if digits.len() > 1 {
            body.push('.');
            body.push_str(&digits[1..]);
        }
        let exp_sign = if exponent < 0 { '-' } else { '+' };
        return format!("{}{}e{}{:02}", sign, body, exp_sign, exponent.abs());
    }

    let point = exponent + 1;
    let text = if point <= 0 {
        format!("0.{}{}", "0".repeat((-point) as usize), digits)
    } else if (point as usize) >= digits.len() {
        format!(
            "{}{}.0",
            digits,
            "0".repeat(point as usize - digits.len())
        )
    } else {
        let (int_part, frac_part) = digits.split_at(point as usize);
        format!("{}.{}", int_part, frac_part)
    };
    format!("{}{}", sign, text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_scalars() {
        assert_eq!(render(&Value::Str("x".into())), "x");
        assert_eq!(render(&Value::Int(10)), "10");
        assert_eq!(render(&Value::Bool(false)), "False");
        assert_eq!(render(&Value::Bool(true)), "True");
        assert_eq!(render(&Value::Null), "None");
    }

    #[test]
    fn test_floats() {
        assert_eq!(render_float(2.5), "2.5");
        assert_eq!(render_float(10.0), "10.0");
        assert_eq!(render_float(-0.5), "-0.5");
        assert_eq!(render_float(0.0001), "0.0001");
        assert_eq!(render_float(0.00001), "1e-05");
        assert_eq!(render_float(1e16), "1e+16");
        assert_eq!(render_float(1.5e17), "1.5e+17");
        assert_eq!(render_float(123456.789), "123456.789");
        assert_eq!(render_float(0.1), "0.1");
        assert_eq!(render_float(f64::NAN), "nan");
        assert_eq!(render_float(f64::NEG_INFINITY), "-inf");
    }

    #[test]
    fn test_lists_and_maps() {
        let list = Value::List(vec![Value::from("test1"), Value::from("test2")]);
        assert_eq!(render(&list), "['test1', 'test2']");

        let mixed = Value::List(vec![Value::Int(1), Value::Null, Value::Bool(true)]);
        assert_eq!(render(&mixed), "[1, None, True]");

        let map = Value::Map(vec![("k".to_string(), Value::from("v"))]);
        assert_eq!(render(&map), "{'k': 'v'}");

        assert_eq!(render(&Value::List(vec![])), "[]");
    }

    #[test]
    fn test_quoting() {
        let list = Value::List(vec![Value::from("it's"), Value::from("a\\b")]);
        assert_eq!(render(&list), "[\"it's\", 'a\\\\b']");
    }

    #[test]
    fn test_non_printable_characters_are_escaped() {
        let list = Value::List(vec![
            Value::from("a\u{85}b\u{2028}"),
            Value::from("\u{7f}\u{a0}\u{ad}\u{feff}\u{f0000}"),
            Value::from("caf\u{e9} \u{4e16}"),
        ]);
        assert_eq!(
            render(&list),
            "['a\\x85b\\u2028', '\\x7f\\xa0\\xad\\ufeff\\U000f0000', 'caf\u{e9} \u{4e16}']"
        );
    }

    #[test]
    fn test_timestamps() {
        let ts = Utc.with_ymd_and_hms(2020, 2, 29, 11, 12, 13).unwrap();
        assert_eq!(render(&Value::Timestamp(ts)), "2020-02-29 11:12:13+00:00");

        let with_micros = ts + chrono::Duration::microseconds(500_000);
        assert_eq!(
            render(&Value::Timestamp(with_micros)),
            "2020-02-29 11:12:13.500000+00:00"
        );

        assert_eq!(
            render(&Value::List(vec![Value::Timestamp(ts)])),
            "[datetime.datetime(2020, 2, 29, 11, 12, 13, tzinfo=datetime.timezone.utc)]"
        );
    }
}
