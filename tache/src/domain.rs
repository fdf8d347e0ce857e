use std::time::Duration;

/// Name of the store-wide counter behind `get_key`.
///
/// Every backend pointed at the same store shares this one counter, so keys
/// handed out by different processes never collide.
pub const COUNTER_KEY: &str = "tag:id";

/// Marker for "no entry under this key".
///
/// Distinct from every cacheable value, including a cached `None`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct NoValue;

pub const NO_VALUE: NoValue = NoValue;

/// Result of reading one key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Lookup<T> {
    Miss(NoValue),
    Hit(T),
}

impl<T> Lookup<T> {
    pub fn miss() -> Self {
        Lookup::Miss(NO_VALUE)
    }

    pub fn is_miss(&self) -> bool {
        matches!(self, Lookup::Miss(_))
    }

    pub fn is_hit(&self) -> bool {
        !self.is_miss()
    }

    /// The cached value, or `None` on a miss.
    pub fn hit(self) -> Option<T> {
        match self {
            Lookup::Hit(value) => Some(value),
            Lookup::Miss(_) => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lookup<U> {
        match self {
            Lookup::Hit(value) => Lookup::Hit(f(value)),
            Lookup::Miss(marker) => Lookup::Miss(marker),
        }
    }

    /// The cached value, or the result of `f` on a miss.
    pub fn unwrap_or_else(self, f: impl FnOnce() -> T) -> T {
        match self {
            Lookup::Hit(value) => value,
            Lookup::Miss(_) => f(),
        }
    }
}

impl<T> From<NoValue> for Lookup<T> {
    fn from(marker: NoValue) -> Self {
        Lookup::Miss(marker)
    }
}

impl<T> PartialEq<NoValue> for Lookup<T> {
    fn eq(&self, _other: &NoValue) -> bool {
        self.is_miss()
    }
}

/// Payload encoding chosen per backend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Format {
    /// Type-preserving structured encoding (JSON).
    #[default]
    Structured,
    /// Raw bytes, stored as given.
    Bytes,
}

impl Format {
    pub const BYTES_NAME: &str = "BYTES";

    /// `"BYTES"` selects raw bytes; any other name, or none, selects structured.
    pub fn from_name(name: Option<&str>) -> Self {
        match name {
            Some(Self::BYTES_NAME) => Format::Bytes,
            _ => Format::Structured,
        }
    }

    pub fn is_bytes(&self) -> bool {
        matches!(self, Format::Bytes)
    }
}

/// One encoded write: key, payload and the TTL it will be stored with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    pub key: String,
    pub payload: Vec<u8>,
    pub ttl: Duration,
}

impl Entry {
    pub fn new(key: impl Into<String>, payload: Vec<u8>, ttl: Duration) -> Self {
        Self {
            key: key.into(),
            payload,
            ttl,
        }
    }
}
