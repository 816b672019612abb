use std::cmp::Ordering;
use std::fmt;

/// A single SQL value as produced by a session and consumed as a statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    Null,
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
}

/// The numeric interpretation of a datum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    UInt(u64),
    Float(f64),
}

impl Number {
    #[inline]
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::UInt(u) => u as f64,
            Number::Float(f) => f,
        }
    }

    /// The value as a signed integer, if it is an integer that fits.
    pub fn as_i64(self) -> Option<i64> {
        match self {
            Number::Int(i) => Some(i),
            Number::UInt(u) => i64::try_from(u).ok(),
            Number::Float(_) => None,
        }
    }

    fn compare(self, other: Number) -> Option<Ordering> {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => Some(a.cmp(&b)),
            (Number::UInt(a), Number::UInt(b)) => Some(a.cmp(&b)),
            (Number::Int(a), Number::UInt(b)) => match u64::try_from(a) {
                Ok(a) => Some(a.cmp(&b)),
                Err(_) => Some(Ordering::Less),
            },
            (Number::UInt(_), Number::Int(_)) => other.compare(self).map(Ordering::reverse),
            (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
        }
    }
}

impl From<Number> for Datum {
    #[inline]
    fn from(n: Number) -> Self {
        match n {
            Number::Int(i) => Datum::Int(i),
            Number::UInt(u) => Datum::UInt(u),
            Number::Float(f) => Datum::Float(f),
        }
    }
}

impl Datum {
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }

    /// Renders the value the way the text protocol sends it to clients.
    /// `NULL` has no textual form and renders as `None`.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Datum::Null => None,
            Datum::Int(i) => Some(i.to_string()),
            Datum::UInt(u) => Some(u.to_string()),
            Datum::Float(f) => Some(f.to_string()),
            Datum::Text(s) => Some(s.clone()),
        }
    }

    /// Interprets the value as a number. Text is parsed MySQL style: the longest numeric
    /// prefix is used and the returned flag is `false` if anything had to be discarded.
    pub fn to_number(&self) -> Option<(Number, bool)> {
        match self {
            Datum::Null => None,
            Datum::Int(i) => Some((Number::Int(*i), true)),
            Datum::UInt(u) => Some((Number::UInt(*u), true)),
            Datum::Float(f) => Some((Number::Float(*f), true)),
            Datum::Text(s) => Some(parse_number(s)),
        }
    }

    /// Compares two values with SQL semantics, `None` if either side is `NULL`.
    /// Two strings compare bytewise, anything else compares numerically.
    pub fn sql_cmp(&self, other: &Datum) -> Option<Ordering> {
        match (self, other) {
            (Datum::Null, _) | (_, Datum::Null) => None,
            (Datum::Text(a), Datum::Text(b)) => Some(a.cmp(b)),
            _ => {
                let (a, _) = self.to_number()?;
                let (b, _) = other.to_number()?;
                a.compare(b)
            }
        }
    }

    /// A total order used for sorting, `NULL` sorts first.
    pub fn sort_cmp(&self, other: &Datum) -> Ordering {
        match (self.is_null(), other.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => self.sql_cmp(other).unwrap_or(Ordering::Equal),
        }
    }

    /// SQL truthiness, `None` for `NULL`.
    pub fn truthy(&self) -> Option<bool> {
        let (n, _) = self.to_number()?;
        Some(n.as_f64() != 0.0)
    }
}

fn parse_number(s: &str) -> (Number, bool) {
    let trimmed = s.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return (Number::Int(i), true);
    }
    if let Ok(u) = trimmed.parse::<u64>() {
        return (Number::UInt(u), true);
    }
    if !trimmed.is_empty() && trimmed.chars().all(|c| "+-.eE0123456789".contains(c)) {
        if let Ok(f) = trimmed.parse::<f64>() {
            return (Number::Float(f), true);
        }
    }

    // longest numeric-looking prefix that still parses as a float
    let candidate = trimmed.find(|c: char| !"+-.eE0123456789".contains(c)).unwrap_or(trimmed.len());
    let mut end = 0;
    for i in 1..=candidate {
        if trimmed[..i].parse::<f64>().is_ok() {
            end = i;
        }
    }
    let value = if end == 0 { 0.0 } else { trimmed[..end].parse::<f64>().unwrap_or(0.0) };
    (Number::Float(value), false)
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datum::Null => write!(f, "NULL"),
            Datum::Int(i) => write!(f, "{i}"),
            Datum::UInt(u) => write!(f, "{u}"),
            Datum::Float(x) => write!(f, "{x}"),
            Datum::Text(s) => write!(f, "{s}"),
        }
    }
}

macro_rules! impl_from {
    ($variant:ident: $($ty:ty),*) => {
        $(
            impl From<$ty> for Datum {
                #[inline]
                fn from(v: $ty) -> Self {
                    Datum::$variant(v.into())
                }
            }
        )*
    };
}

impl_from!(Int: i8, i16, i32, i64);
impl_from!(UInt: u8, u16, u32, u64);
impl_from!(Float: f32, f64);
impl_from!(Text: &str, String, &String);

impl From<bool> for Datum {
    #[inline]
    fn from(b: bool) -> Self {
        Datum::Int(b as i64)
    }
}

impl From<usize> for Datum {
    #[inline]
    fn from(u: usize) -> Self {
        Datum::UInt(u as u64)
    }
}

impl From<isize> for Datum {
    #[inline]
    fn from(i: isize) -> Self {
        Datum::Int(i as i64)
    }
}

impl<T: Into<Datum>> From<Option<T>> for Datum {
    #[inline]
    fn from(value: Option<T>) -> Self {
        value.map_or(Datum::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_rendering() {
        assert_eq!(Datum::from(1).to_text().as_deref(), Some("1"));
        assert_eq!(Datum::from(2.0).to_text().as_deref(), Some("2"));
        assert_eq!(Datum::from(0.5).to_text().as_deref(), Some("0.5"));
        assert_eq!(Datum::from(u64::MAX).to_text().as_deref(), Some("18446744073709551615"));
        assert_eq!(Datum::from(true).to_text().as_deref(), Some("1"));
        assert_eq!(Datum::from(None::<i64>).to_text(), None);
    }

    #[test]
    fn text_to_number() {
        assert_eq!(Datum::from("12").to_number(), Some((Number::Int(12), true)));
        assert_eq!(Datum::from(" 1.5 ").to_number(), Some((Number::Float(1.5), true)));
        assert_eq!(Datum::from("12abc").to_number(), Some((Number::Float(12.0), false)));
        assert_eq!(Datum::from("abc").to_number(), Some((Number::Float(0.0), false)));
    }

    #[test]
    fn sql_comparison() {
        assert_eq!(Datum::from(1).sql_cmp(&Datum::from(1.0)), Some(Ordering::Equal));
        assert_eq!(Datum::from(-1).sql_cmp(&Datum::from(u64::MAX)), Some(Ordering::Less));
        assert_eq!(Datum::from("b").sql_cmp(&Datum::from("a")), Some(Ordering::Greater));
        assert_eq!(Datum::from("10").sql_cmp(&Datum::from(9)), Some(Ordering::Greater));
        assert_eq!(Datum::Null.sql_cmp(&Datum::Null), None);
        assert_eq!(Datum::Null.sort_cmp(&Datum::from(0)), Ordering::Less);
    }
}
