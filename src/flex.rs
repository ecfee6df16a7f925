use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::api::StreamType;

/// A scalar that IPTV backends send as a number, a string, or null.
/// Ids and ratings arrive in every shape depending on the upstream provider.
#[derive(Debug, Clone, PartialEq)]
enum FlexScalar {
    Int(i64),
    Float(f64),
    Text(String),
    Null,
}

impl<'de> Deserialize<'de> for FlexScalar {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::{self, Visitor};

        struct FlexScalarVisitor;

        impl<'de> Visitor<'de> for FlexScalarVisitor {
            type Value = FlexScalar;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a number, string, or null")
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
                Ok(FlexScalar::Int(v as i64))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(FlexScalar::Int(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(FlexScalar::Int(v as i64))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
                Ok(FlexScalar::Float(v))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(FlexScalar::Text(v.to_string()))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
                Ok(FlexScalar::Text(v))
            }

            fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(FlexScalar::Null)
            }

            fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(FlexScalar::Null)
            }
        }

        deserializer.deserialize_any(FlexScalarVisitor)
    }
}

impl FlexScalar {
    fn as_i64(&self) -> Option<i64> {
        match self {
            FlexScalar::Int(n) => Some(*n),
            FlexScalar::Float(f) if f.is_finite() => Some(*f as i64),
            FlexScalar::Float(_) => None,
            FlexScalar::Text(s) => s.trim().parse().ok(),
            FlexScalar::Null => None,
        }
    }
}

/// Rating as the backend stores it: sometimes `7.4`, sometimes `"7.4"`.
/// The original shape is kept so a channel can be posted back unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum Rating {
    Number(f64),
    Text(String),
}

impl Rating {
    /// Numeric value used for ordering. Non-numeric text counts as 0.
    pub fn as_f64(&self) -> f64 {
        let value = match self {
            Rating::Number(n) => *n,
            Rating::Text(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        };
        if value.is_nan() || value == 0.0 {
            0.0
        } else {
            value
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rating::Number(n) => write!(f, "{}", n),
            Rating::Text(s) => write!(f, "{}", s),
        }
    }
}

impl Serialize for Rating {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Rating::Number(n) => serializer.serialize_f64(*n),
            Rating::Text(s) => serializer.serialize_str(s),
        }
    }
}

impl<'de> Deserialize<'de> for Rating {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error;

        match FlexScalar::deserialize(deserializer)? {
            FlexScalar::Int(n) => Ok(Rating::Number(n as f64)),
            FlexScalar::Float(f) => Ok(Rating::Number(f)),
            FlexScalar::Text(s) => Ok(Rating::Text(s)),
            FlexScalar::Null => Err(D::Error::custom("rating is null")),
        }
    }
}

/// Deserialize an integer id from a number, a numeric string, or null (0).
pub fn deserialize_flex_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let flex = FlexScalar::deserialize(deserializer)?;
    Ok(flex.as_i64().unwrap_or(0))
}

/// Like [`deserialize_flex_i64`] but keeps "absent" distinct from zero.
pub fn deserialize_flex_option_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let flex = FlexScalar::deserialize(deserializer)?;
    Ok(flex.as_i64())
}

/// Null, empty and whitespace-only strings all become `None`.
pub fn deserialize_blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<FlexScalar>::deserialize(deserializer)?;
    Ok(match value {
        Some(FlexScalar::Text(s)) if !s.trim().is_empty() => Some(s),
        Some(FlexScalar::Int(n)) => Some(n.to_string()),
        Some(FlexScalar::Float(f)) => Some(f.to_string()),
        _ => None,
    })
}

/// Unknown or blank stream types leave the item unclassified.
pub fn deserialize_stream_type<'de, D>(deserializer: D) -> Result<Option<StreamType>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.and_then(|s| s.parse().ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Ids {
        #[serde(deserialize_with = "deserialize_flex_i64")]
        id: i64,
        #[serde(default, deserialize_with = "deserialize_flex_option_i64")]
        parent: Option<i64>,
    }

    #[test]
    fn test_number_id() {
        let ids: Ids = serde_json::from_str(r#"{"id": 123}"#).unwrap();
        assert_eq!(ids.id, 123);
        assert_eq!(ids.parent, None);
    }

    #[test]
    fn test_numeric_string_id() {
        let ids: Ids = serde_json::from_str(r#"{"id": "456", "parent": "7"}"#).unwrap();
        assert_eq!(ids.id, 456);
        assert_eq!(ids.parent, Some(7));
    }

    #[test]
    fn test_null_id_defaults_to_zero() {
        let ids: Ids = serde_json::from_str(r#"{"id": null, "parent": null}"#).unwrap();
        assert_eq!(ids.id, 0);
        assert_eq!(ids.parent, None);
    }

    #[test]
    fn test_rating_shapes() {
        let n: Rating = serde_json::from_str("7.5").unwrap();
        let s: Rating = serde_json::from_str(r#""8.1""#).unwrap();
        let junk: Rating = serde_json::from_str(r#""N/A""#).unwrap();
        assert_eq!(n.as_f64(), 7.5);
        assert_eq!(s.as_f64(), 8.1);
        assert_eq!(junk.as_f64(), 0.0);
        assert_eq!(serde_json::to_string(&s).unwrap(), r#""8.1""#);
    }
}
