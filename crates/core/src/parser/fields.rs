//! Declarative field extraction.
//!
//! A [`FieldRegistry`] is an ordered table of [`FieldSpec`]s. Every spec is
//! matched against a line on its own, so a field that fails to match never
//! prevents the others from being extracted. Values that come out "empty"
//! (zero, NaN, empty text) are omitted rather than defaulted; a field that
//! is legitimately zero is therefore absent from the result. Infinite
//! floats are omitted as well, so a degenerate `640x0` frame size yields no
//! `aspect_ratio` instead of one that cannot be written as JSON.

use once_cell::sync::Lazy;
use regex_lite::{Captures, Regex};
use serde::Serialize;
use std::collections::BTreeMap;

/// A typed value pulled out of a diagnostic line.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Text(String),
    Size { width: u32, height: u32 },
}

impl FieldValue {
    /// Whether the value counts as present.
    ///
    /// Zero, non-finite floats and empty strings do not.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Int(v) => *v != 0,
            Self::Float(v) => *v != 0.0 && v.is_finite(),
            Self::Text(s) => !s.is_empty(),
            Self::Size { .. } => true,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Converts matched text into a [`FieldValue`].
#[derive(Clone, Copy)]
pub enum Transform {
    /// Receives the text of the selected capture group.
    Value(fn(&str) -> Option<FieldValue>),
    /// Receives every capture group of the match.
    Captures(fn(&Captures<'_>) -> Option<FieldValue>),
}

impl std::fmt::Debug for Transform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value(_) => f.write_str("Transform::Value"),
            Self::Captures(_) => f.write_str("Transform::Captures"),
        }
    }
}

/// Rule extracting one named field from a line.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    name: &'static str,
    pattern: Regex,
    group: Option<usize>,
    transform: Option<Transform>,
}

impl FieldSpec {
    /// Creates a spec for `name` matching `pattern`.
    ///
    /// # Panics
    ///
    /// Panics if `pattern` is not a valid regular expression. Registries are
    /// built from literals, so this only fires on a programming error.
    pub fn new(name: &'static str, pattern: &str) -> Self {
        Self {
            name,
            pattern: Regex::new(pattern)
                .unwrap_or_else(|e| panic!("invalid pattern for field '{}': {}", name, e)),
            group: None,
            transform: None,
        }
    }

    /// Selects the capture group holding the raw value.
    pub fn group(mut self, index: usize) -> Self {
        self.group = Some(index);
        self
    }

    /// Transforms the selected group's text.
    pub fn map(mut self, f: fn(&str) -> Option<FieldValue>) -> Self {
        self.transform = Some(Transform::Value(f));
        self
    }

    /// Transforms the whole capture set.
    pub fn map_captures(mut self, f: fn(&Captures<'_>) -> Option<FieldValue>) -> Self {
        self.transform = Some(Transform::Captures(f));
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Applies this spec to `line`, returning a value only when it is truthy.
    pub fn extract(&self, line: &str) -> Option<FieldValue> {
        let caps = self.pattern.captures(line)?;
        let value = match self.transform {
            Some(Transform::Captures(f)) => f(&caps)?,
            Some(Transform::Value(f)) => f(caps.get(self.group.unwrap_or(0))?.as_str())?,
            None => FieldValue::Text(caps.get(self.group.unwrap_or(0))?.as_str().to_string()),
        };
        value.is_truthy().then_some(value)
    }
}

/// Fields extracted from a single line, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldMap(BTreeMap<&'static str, FieldValue>);

impl FieldMap {
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.0.get(name)
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(FieldValue::as_int)
    }

    pub fn float(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(FieldValue::as_float)
    }

    pub fn text(&self, name: &str) -> Option<String> {
        self.get(name).and_then(FieldValue::as_text).map(str::to_string)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }
}

/// Ordered table of field specs evaluated independently.
#[derive(Debug, Clone)]
pub struct FieldRegistry {
    specs: Vec<FieldSpec>,
}

impl FieldRegistry {
    pub fn new(specs: Vec<FieldSpec>) -> Self {
        Self { specs }
    }

    /// Applies every spec to `line`.
    pub fn extract(&self, line: &str) -> FieldMap {
        let mut fields = BTreeMap::new();
        for spec in &self.specs {
            if let Some(value) = spec.extract(line) {
                fields.insert(spec.name(), value);
            }
        }
        FieldMap(fields)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.specs.iter().map(FieldSpec::name)
    }
}

/// Fields of a `Stream #x:y` declaration.
pub static METADATA_FIELDS: Lazy<FieldRegistry> = Lazy::new(|| {
    FieldRegistry::new(vec![
        FieldSpec::new("type", r"(?i)Stream #\d+:\d+.*?: (\w+):")
            .group(1)
            .map(|s| Some(FieldValue::Text(s.to_lowercase()))),
        FieldSpec::new("codec", r"(?i)Stream.*?:.*?: \w+: ([^\s,(]+)").group(1),
        FieldSpec::new("sample_rate", r"(?i)(\d+) Hz")
            .group(1)
            .map(int_value),
        FieldSpec::new("channels", r"(?i)\d+ Hz, (.*?)(?:,|$)")
            .group(1)
            .map(|s| parse_channels(s).map(FieldValue::Int)),
        FieldSpec::new("bitrate", r"(?i)(\d+) (\w)?b/s").map_captures(|caps| {
            let value = parse_int_prefix(caps.get(1)?.as_str())?;
            scale_decimal(value, caps.get(2).map(|m| m.as_str())).map(FieldValue::Int)
        }),
        FieldSpec::new("fps", r"(?i)([\d.]+) fps").group(1).map(int_value),
        FieldSpec::new("size", r"(?i)(\d+)x(\d+)(?:[\s,]|$)").map_captures(|caps| {
            let width = caps.get(1)?.as_str().parse().ok()?;
            let height = caps.get(2)?.as_str().parse().ok()?;
            Some(FieldValue::Size { width, height })
        }),
        FieldSpec::new("aspect_ratio", r"(?i)(\d+)x(\d+)(?:[\s,]|$)").map_captures(|caps| {
            let width: f64 = caps.get(1)?.as_str().parse().ok()?;
            let height: f64 = caps.get(2)?.as_str().parse().ok()?;
            Some(FieldValue::Float(width / height))
        }),
        FieldSpec::new("colors", r"(?i)Video:[^,]*, ([^\s,(]+)").group(1),
    ])
});

/// Fields of a `frame=... size=...` progress line.
pub static PROGRESS_FIELDS: Lazy<FieldRegistry> = Lazy::new(|| {
    FieldRegistry::new(vec![
        FieldSpec::new("frame", r"(?i)frame=\s*(\d+)").group(1).map(int_value),
        FieldSpec::new("fps", r"(?i)fps=\s*([\d.]+)").group(1).map(int_value),
        FieldSpec::new("quality", r"(?i)q=\s*([\d.]+)").group(1).map(int_value),
        FieldSpec::new("size", r"(?i)size=\s*(\d+)(\w)?i?b").map_captures(|caps| {
            let value = parse_int_prefix(caps.get(1)?.as_str())?;
            scale_binary(value, caps.get(2).map(|m| m.as_str())).map(FieldValue::Int)
        }),
        FieldSpec::new("time", r"(?i)time=\s*(\d+:\d+:\d+\.\d+)")
            .group(1)
            .map(|s| {
                let ms = parse_duration(s)?;
                i64::try_from(ms).ok().map(FieldValue::Int)
            }),
        FieldSpec::new("bitrate", r"(?i)bitrate=\s*([\d.]+)(\w)?bits/s").map_captures(|caps| {
            let value = parse_int_prefix(caps.get(1)?.as_str())?;
            scale_decimal(value, caps.get(2).map(|m| m.as_str())).map(FieldValue::Int)
        }),
    ])
});

fn int_value(s: &str) -> Option<FieldValue> {
    parse_int_prefix(s).map(FieldValue::Int)
}

/// Parses the leading integer of `s`, ignoring anything after it.
///
/// `"29.97"` gives `29`, `"5.1(side)"` gives `5`, `"abc"` gives `None`.
pub fn parse_int_prefix(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    let value: i64 = digits[..end].parse().ok()?;
    Some(if negative { -value } else { value })
}

/// Converts an `HH:MM:SS.fff` timestamp to milliseconds.
///
/// The fractional part is a decimal fraction of a second, so `.5` and
/// `.50` both mean 500 ms. Digits past millisecond precision are dropped.
/// Returns `None` when the total does not fit in a `u64`.
pub fn parse_duration(s: &str) -> Option<u64> {
    let mut parts = s.trim().splitn(3, ':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let (secs, fraction) = parts.next()?.split_once('.')?;
    let secs: u64 = secs.parse().ok()?;

    if !fraction.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let mut millis = String::from(&fraction[..fraction.len().min(3)]);
    while millis.len() < 3 {
        millis.push('0');
    }
    let millis: u64 = millis.parse().ok()?;

    hours
        .checked_mul(3_600_000)?
        .checked_add(minutes.checked_mul(60_000)?)?
        .checked_add(secs.checked_mul(1000)?)?
        .checked_add(millis)
}

/// Maps a channel layout token to a channel count.
pub fn parse_channels(s: &str) -> Option<i64> {
    match s.trim() {
        "mono" => Some(1),
        "stereo" => Some(2),
        other => parse_int_prefix(other),
    }
}

/// Scales by powers of 1000 for a `k` or `m` suffix, `None` on overflow.
pub fn scale_decimal(value: i64, unit: Option<&str>) -> Option<i64> {
    scale(value, unit, 1000)
}

/// Scales by powers of 1024 for a `k` or `m` suffix, `None` on overflow.
pub fn scale_binary(value: i64, unit: Option<&str>) -> Option<i64> {
    scale(value, unit, 1024)
}

fn scale(value: i64, unit: Option<&str>, base: i64) -> Option<i64> {
    match unit.map(str::to_ascii_lowercase).as_deref() {
        Some("k") => value.checked_mul(base),
        Some("m") => value.checked_mul(base * base),
        _ => Some(value),
    }
}
