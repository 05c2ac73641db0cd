use std::borrow::Cow;

use serde::Deserialize;

/// Output encoding of rendered rows. Labels are escaped when rendered,
/// never when a group key is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum OutputFormat {
    #[default]
    Tsv,
    Csv,
}

impl OutputFormat {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "tsv" => Some(Self::Tsv),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }

    pub fn separator(&self) -> char {
        match self {
            OutputFormat::Tsv => '\t',
            OutputFormat::Csv => ',',
        }
    }

    pub fn escape<'a>(&self, value: &'a str) -> Cow<'a, str> {
        match self {
            OutputFormat::Tsv => {
                if value.contains(['\t', '\r', '\n']) {
                    Cow::Owned(value.replace(['\t', '\r', '\n'], "\u{FFFD}"))
                } else {
                    Cow::Borrowed(value)
                }
            }
            OutputFormat::Csv => {
                if value.contains([',', '"', '\r', '\n']) {
                    Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
                } else {
                    Cow::Borrowed(value)
                }
            }
        }
    }

    /// Joins already-escaped cells.
    pub fn join<S: AsRef<str>>(&self, cells: &[S]) -> String {
        let mut out = String::new();
        for (i, cell) in cells.iter().enumerate() {
            if i > 0 {
                out.push(self.separator());
            }
            out.push_str(cell.as_ref());
        }
        out
    }
}

impl TryFrom<String> for OutputFormat {
    type Error = String;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        Self::parse(&name)
            .ok_or_else(|| format!("unknown output format '{}', expected tsv or csv", name))
    }
}

const MAX_FRACTION_DIGITS: usize = 7;

/// Integral values print without a fraction, others with at most seven
/// fraction digits and no trailing zeros.
pub fn format_double(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        let mut buf = itoa::Buffer::new();
        return buf.format(value as i64).to_string();
    }
    let fixed = format!("{:.*}", MAX_FRACTION_DIGITS, value);
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}
