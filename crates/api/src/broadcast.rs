//! Broadcast related types.
//!
//! Every settlement of a fetch is announced to the sibling contexts over a
//! named [BroadcastChannel] as a [BroadcastMessage]. The wire form is:
//!
//! ```json
//! { "code": 1, "key": "<fingerprint>", "res": "<json text>" }
//! ```
//!
//! where `code` is `1` for success and `2` for failure, and `res` is the
//! JSON-serialized result (success) or [ErrorReport] (failure).

use crate::{builder::Builder, config::Config, *};
use std::sync::Arc;

/// Outcome class of a settled fetch.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize,
)]
#[serde(into = "u8", try_from = "u8")]
pub enum SettleCode {
    /// The fetch produced a result.
    Success,

    /// The fetch failed.
    Failure,
}

impl From<SettleCode> for u8 {
    fn from(code: SettleCode) -> Self {
        match code {
            SettleCode::Success => 1,
            SettleCode::Failure => 2,
        }
    }
}

impl TryFrom<u8> for SettleCode {
    type Error = CacheError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(SettleCode::Success),
            2 => Ok(SettleCode::Failure),
            oth => Err(CacheError::other(format!("invalid settle code {oth}"))),
        }
    }
}

/// Settlement notice sent to sibling contexts.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BroadcastMessage {
    /// Success or failure.
    pub code: SettleCode,

    /// The fingerprint that settled.
    #[serde(rename = "key")]
    pub fingerprint: Fingerprint,

    /// Serialized result or error report.
    #[serde(rename = "res")]
    pub result: String,
}

impl BroadcastMessage {
    /// Announce a successful result.
    pub fn success(
        fingerprint: Fingerprint,
        result: &serde_json::Value,
    ) -> CacheResult<Self> {
        let result = serde_json::to_string(result)
            .map_err(|e| CacheError::serialization_src("broadcast result", e))?;
        Ok(Self {
            code: SettleCode::Success,
            fingerprint,
            result,
        })
    }

    /// Announce a failure.
    pub fn failure(
        fingerprint: Fingerprint,
        err: &CacheError,
    ) -> CacheResult<Self> {
        let result = serde_json::to_string(&ErrorReport::from(err))
            .map_err(|e| CacheError::serialization_src("broadcast error", e))?;
        Ok(Self {
            code: SettleCode::Failure,
            fingerprint,
            result,
        })
    }

    /// Decode the settlement this message carries.
    ///
    /// The outer result is the announced outcome. A payload that does not
    /// parse yields [CacheError::Serialization].
    pub fn outcome(&self) -> CacheResult<serde_json::Value> {
        match self.code {
            SettleCode::Success => serde_json::from_str(&self.result)
                .map_err(|e| {
                    CacheError::serialization_src(
                        format!("broadcast result for {}", self.fingerprint),
                        e,
                    )
                }),
            SettleCode::Failure => {
                let report: ErrorReport = serde_json::from_str(&self.result)
                    .map_err(|e| {
                        CacheError::serialization_src(
                            format!("broadcast error for {}", self.fingerprint),
                            e,
                        )
                    })?;
                Err(report.into())
            }
        }
    }
}

/// Receiving half of a [BroadcastChannel] subscription.
pub type BroadcastRecv =
    tokio::sync::mpsc::UnboundedReceiver<BroadcastMessage>;

/// A named cross-context pub/sub channel.
///
/// Messages sent on one channel instance are delivered to every other
/// open instance of the same name, never back to the sender.
pub trait BroadcastChannel: 'static + Send + Sync + std::fmt::Debug {
    /// The channel name.
    fn name(&self) -> &str;

    /// Publish a message to the siblings.
    fn send(&self, message: BroadcastMessage) -> BoxFut<'_, CacheResult<()>>;

    /// Start listening. Calling this again replaces the previous
    /// receiver, which then yields `None`.
    fn on_message(&self) -> CacheResult<BroadcastRecv>;

    /// Stop listening. Outstanding receivers yield `None`.
    /// Sending remains possible.
    fn close(&self);
}

/// Trait-object [BroadcastChannel].
pub type DynBroadcastChannel = Arc<dyn BroadcastChannel>;

/// A factory for constructing [BroadcastChannel] instances.
pub trait BroadcastFactory: 'static + Send + Sync + std::fmt::Debug {
    /// Help the builder construct a default config from the chosen
    /// module factories.
    fn default_config(&self, config: &mut Config) -> CacheResult<()>;

    /// Open a channel instance with the given name.
    fn create(
        &self,
        builder: Arc<Builder>,
        name: String,
    ) -> BoxFut<'static, CacheResult<DynBroadcastChannel>>;
}

/// Trait-object [BroadcastFactory].
pub type DynBroadcastFactory = Arc<dyn BroadcastFactory>;
