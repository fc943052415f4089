use crate::lsps0::parameter_validation::ExpectedFields;
use serde::{
    de::{Deserializer, IgnoredAny, Visitor},
    ser::{SerializeMap, Serializer},
    Deserialize, Serialize,
};

/// Params of a method that takes no arguments.
///
/// LSPS0 requires params to be passed by name. A request with `()` would
/// leave the field out while `NoParams` serializes to `"params" : {}`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NoParams;

impl Serialize for NoParams {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_map(Some(0))?.end()
    }
}

struct NoParamsVisitor;

impl<'de> Visitor<'de> for NoParamsVisitor {
    type Value = NoParams;

    fn expecting(&self, fmt: &mut std::fmt::Formatter) -> Result<(), std::fmt::Error> {
        write!(fmt, "an empty object or null")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: serde::de::MapAccess<'de>,
    {
        match map.next_entry::<String, IgnoredAny>()? {
            Some((key, _)) => Err(serde::de::Error::custom(format!(
                "Unexpected parameter '{}'",
                key
            ))),
            None => Ok(NoParams),
        }
    }

    fn visit_unit<E>(self) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        Ok(NoParams)
    }

    fn visit_none<E>(self) -> Result<Self::Value, E> {
        Ok(NoParams)
    }
}

impl<'de> Deserialize<'de> for NoParams {
    fn deserialize<D>(deserializer: D) -> Result<NoParams, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(NoParamsVisitor)
    }
}

impl ExpectedFields for NoParams {
    fn expected_fields() -> Vec<String> {
        vec![]
    }
}
