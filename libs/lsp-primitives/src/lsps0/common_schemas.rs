// Common schemas shared by the LSPS protocols.

use anyhow::{anyhow, Context, Result};

use serde::de::{Error as DeError, Visitor};
use serde::ser::Error as SeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use time::format_description::well_known::Rfc3339;
use time::format_description::FormatItem;
use time::macros::{format_description, offset};
use time::{OffsetDateTime, PrimitiveDateTime};

use crate::secp256k1::PublicKey as _PublicKey;

/// A compressed secp256k1 public key, hex-encoded on the wire.
///
/// This is the identity of a Lightning peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PublicKey(_PublicKey);

impl From<_PublicKey> for PublicKey {
    fn from(public_key: _PublicKey) -> Self {
        Self(public_key)
    }
}

impl std::str::FromStr for PublicKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl std::fmt::Display for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for PublicKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct PublicKeyVisitor;

        impl Visitor<'_> for PublicKeyVisitor {
            type Value = PublicKey;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(formatter, "A compressed public-key that is hex-encoded")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: DeError,
            {
                PublicKey::from_hex(v).map_err(|err| E::custom(format!("{:#}", err)))
            }
        }

        deserializer.deserialize_str(PublicKeyVisitor)
    }
}

impl PublicKey {
    pub fn from_hex(hex: &str) -> Result<Self> {
        let data = hex::decode(hex).context("Invalid hex")?;
        if data.len() != 33 {
            return Err(anyhow!(
                "Expected a compressed public-key of 33 bytes but got {} bytes",
                data.len()
            ));
        }
        let publickey =
            _PublicKey::from_slice(&data).map_err(|m| anyhow!("Error parsing PublicKey: {}", m))?;
        Ok(PublicKey(publickey))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0.serialize())
    }

    pub fn serialize(&self) -> [u8; 33] {
        self.0.serialize()
    }

    pub fn inner(self) -> _PublicKey {
        self.0
    }
}

/// A timestamp in the `yyyy-mm-ddThh:mm:ss.uuuZ` format of LSPS0.
///
/// Peers that send other RFC 3339 timestamps are tolerated on input,
/// output always uses the LSPS0 format.
#[derive(Debug, Clone, PartialEq, PartialOrd, Copy)]
pub struct IsoDatetime {
    pub datetime: PrimitiveDateTime,
}

const DATETIME_FORMAT: &[FormatItem] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z");

impl IsoDatetime {
    pub fn now() -> Self {
        Self::from_offset_date_time(OffsetDateTime::now_utc())
    }

    pub fn from_offset_date_time(datetime: OffsetDateTime) -> Self {
        let datetime_utc = datetime.to_offset(offset!(UTC));
        Self {
            datetime: PrimitiveDateTime::new(datetime_utc.date(), datetime_utc.time()),
        }
    }

    pub fn from_unix_timestamp(value: i64) -> Result<Self> {
        let offset =
            OffsetDateTime::from_unix_timestamp(value).context("Failed to construct datetime")?;
        Ok(Self::from_offset_date_time(offset))
    }

    pub fn unix_timestamp(&self) -> i64 {
        self.datetime.assume_offset(offset!(UTC)).unix_timestamp()
    }

    pub fn datetime(&self) -> OffsetDateTime {
        self.datetime.assume_utc()
    }

    fn parse(s: &str) -> Result<Self> {
        if let Ok(datetime) = PrimitiveDateTime::parse(s, DATETIME_FORMAT) {
            return Ok(Self { datetime });
        }
        let datetime = OffsetDateTime::parse(s, &Rfc3339)
            .with_context(|| format!("Failed to parse datetime '{}'", s))?;
        Ok(Self::from_offset_date_time(datetime))
    }
}

impl Serialize for IsoDatetime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let datetime_str = self
            .datetime
            .format(&DATETIME_FORMAT)
            .map_err(|err| S::Error::custom(format!("Failed to format datetime {:?}", err)))?;

        serializer.serialize_str(&datetime_str)
    }
}

impl<'de> Deserialize<'de> for IsoDatetime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let str_repr = String::deserialize(deserializer)?;
        Self::parse(&str_repr).map_err(|err| D::Error::custom(format!("{:#}", err)))
    }
}

/// An amount in loki, the base unit of the chain.
///
/// LSPS1 encodes amounts as json-strings to avoid precision loss.
/// Integers are accepted on input as well.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Eq, Ord, Hash, Default)]
pub struct LokiAmount(u64);

impl LokiAmount {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn loki_value(&self) -> u64 {
        self.0
    }

    pub fn checked_add(&self, other: &Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }
}

impl std::fmt::Display for LokiAmount {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(fmt, "{} loki", self.0)
    }
}

impl From<u64> for LokiAmount {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl Serialize for LokiAmount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for LokiAmount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct LokiAmountVisitor;

        impl Visitor<'_> for LokiAmountVisitor {
            type Value = LokiAmount;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(formatter, "An unsigned 64-bit integer encoded as a string")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: DeError,
            {
                v.parse::<u64>()
                    .map(LokiAmount)
                    .map_err(|_| E::custom(format!("Failed to parse amount '{}'", v)))
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: DeError,
            {
                Ok(LokiAmount(v))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: DeError,
            {
                u64::try_from(v)
                    .map(LokiAmount)
                    .map_err(|_| E::custom(format!("Amount must be positive but got {}", v)))
            }
        }

        deserializer.deserialize_any(LokiAmountVisitor)
    }
}
