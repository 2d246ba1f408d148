/// rpc_cache timestamp.
///
/// Internally i64 milliseconds from unix epoch, the same resolution the
/// cache expiry metadata is written in.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Construct a new timestamp of "now".
    pub fn now() -> Self {
        std::time::SystemTime::now().into()
    }

    /// Construct a timestamp from i64 milliseconds since unix epoch.
    pub fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Get the i64 milliseconds since unix epoch.
    pub fn as_millis(&self) -> i64 {
        self.0
    }
}

fn millis(d: std::time::Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

impl std::ops::Add<std::time::Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: std::time::Duration) -> Self::Output {
        Timestamp(self.0.saturating_add(millis(rhs)))
    }
}

impl From<std::time::SystemTime> for Timestamp {
    fn from(t: std::time::SystemTime) -> Self {
        let since_epoch = t
            .duration_since(std::time::SystemTime::UNIX_EPOCH)
            .unwrap_or_default();
        Self(millis(since_epoch))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::time::Duration;

    #[test]
    fn arithmetic_in_millis() {
        let t = Timestamp::from_millis(1_000);
        assert_eq!(2_500, (t + Duration::from_millis(1_500)).as_millis());
        assert_eq!(i64::MAX, (t + Duration::MAX).as_millis());
    }

    #[test]
    fn serializes_as_bare_number() {
        let t = Timestamp::from_millis(42);
        assert_eq!("42", serde_json::to_string(&t).unwrap());
        assert_eq!(t, serde_json::from_str::<Timestamp>("42").unwrap());
    }
}
