use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::MAX_SAFE_ID;

/// JWT claims carried by every bearer token.
///
/// Decoded once at the verification boundary; handlers only ever see this
/// typed view, never a loose claim map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: u64,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

/// Accepts the identity either as a JSON integer or as an integral float.
///
/// Some token producers emit every number as a double, so `42.0` must decode
/// to `42`. Fractional, negative, non-finite and out-of-range values (above
/// 2^53, where doubles stop being exact) are rejected.
pub fn deserialize_id<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(IdVisitor)
}

struct IdVisitor;

impl Visitor<'_> for IdVisitor {
    type Value = u64;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "a non-negative integer identity no larger than 2^53")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<u64, E> {
        if v > MAX_SAFE_ID {
            return Err(E::invalid_value(de::Unexpected::Unsigned(v), &self));
        }
        Ok(v)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<u64, E> {
        let v = u64::try_from(v).map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))?;
        self.visit_u64(v)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<u64, E> {
        if !v.is_finite() || v.fract() != 0.0 || v < 0.0 || v > MAX_SAFE_ID as f64 {
            return Err(E::invalid_value(de::Unexpected::Float(v), &self));
        }
        Ok(v as u64)
    }
}
