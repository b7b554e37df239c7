use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::borrow::Cow;
use std::fmt;

/// A single cell of a delimited record.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Absent,
}

/// Markers that a dataset uses for a missing value.
const MISSING_MARKERS: &[&str] = &[
    "", "NA", "N/A", "n/a", "NaN", "nan", "NULL", "null", "None", "#N/A", "<NA>",
];

pub fn is_missing_marker(raw: &str) -> bool {
    MISSING_MARKERS.contains(&raw.trim())
}

impl FieldValue {
    pub fn is_absent(&self) -> bool {
        matches!(self, FieldValue::Absent)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Render the value as text, the way it is shown to a searching user.
    pub fn render(&self) -> Option<Cow<'_, str>> {
        match self {
            FieldValue::Text(s) => Some(Cow::Borrowed(s)),
            FieldValue::Number(n) => Some(Cow::Owned(format_number(*n))),
            FieldValue::Absent => None,
        }
    }

    /// Coerce to a finite number. Text is parsed; anything unparseable is `None`.
    pub fn to_number(&self) -> Option<f64> {
        let n = match self {
            FieldValue::Number(n) => *n,
            FieldValue::Text(s) => s.trim().parse::<f64>().ok()?,
            FieldValue::Absent => return None,
        };
        n.is_finite().then_some(n)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => write!(f, "{}", s),
            FieldValue::Number(n) => write!(f, "{}", format_number(*n)),
            FieldValue::Absent => write!(f, "null"),
        }
    }
}

fn format_number(n: f64) -> String {
    if is_integral(n) {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

// Integral values inside the exactly representable range print without a fraction.
fn is_integral(n: f64) -> bool {
    n.is_finite() && n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0
}

/// Serialize a float, mapping NaN and infinities to `null`.
pub fn serialize_finite<S: Serializer>(value: f64, serializer: S) -> Result<S::Ok, S::Error> {
    if !value.is_finite() {
        serializer.serialize_none()
    } else if is_integral(value) {
        serializer.serialize_i64(value as i64)
    } else {
        serializer.serialize_f64(value)
    }
}

/// `serialize_with` adapter for optional floats.
pub fn serialize_optional_finite<S: Serializer>(
    value: &Option<f64>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(v) => serialize_finite(*v, serializer),
        None => serializer.serialize_none(),
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Text(s) => serializer.serialize_str(s),
            FieldValue::Number(n) => serialize_finite(*n, serializer),
            FieldValue::Absent => serializer.serialize_none(),
        }
    }
}

/// One row of a dataset file: field name to value, in header order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: IndexMap<String, FieldValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: IndexMap::with_capacity(capacity),
        }
    }

    pub fn set_field(&mut self, key: impl Into<String>, value: FieldValue) {
        self.fields.insert(key.into(), value);
    }

    /// Absent-safe lookup: unknown fields read as `Absent`.
    pub fn get(&self, key: &str) -> &FieldValue {
        self.fields.get(key).unwrap_or(&FieldValue::Absent)
    }

    pub fn contains_field(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<K: Into<String>> FromIterator<(K, FieldValue)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, FieldValue)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}
