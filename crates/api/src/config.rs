//! Types for use when configuring rpc_cache modules.

use crate::*;

/// helper transcode function
fn tc<S: serde::Serialize, D: serde::de::DeserializeOwned>(
    s: &S,
) -> CacheResult<D> {
    serde_json::from_str(
        &serde_json::to_string(s)
            .map_err(|e| CacheError::other_src("encode", e))?,
    )
    .map_err(|e| CacheError::other_src("decode", e))
}

/// Denotes a type used to configure one or more rpc_cache modules.
///
/// A module config is a struct whose top-level fields are named after the
/// module they configure, e.g. `{ "coreRequestCache": { .. } }`. Several
/// module configs are merged side by side into one [Config].
///
/// Deserialization should be tolerant to missing properties, since the
/// values may come from a hand-edited file.
pub trait ModConfig:
    'static
    + Sized
    + Default
    + std::fmt::Debug
    + serde::Serialize
    + serde::de::DeserializeOwned
    + Send
    + Sync
{
}

/// rpc_cache configuration.
#[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
pub struct Config(serde_json::Map<String, serde_json::Value>);

impl Config {
    fn top_level<M: ModConfig>(
        m: &M,
    ) -> CacheResult<serde_json::Map<String, serde_json::Value>> {
        match tc(m)? {
            serde_json::Value::Object(map) => Ok(map),
            oth => Err(CacheError::other(format!(
                "module config must serialize to an object, got: {oth}"
            ))),
        }
    }

    /// Called by module factories when the builder is generating a default
    /// configuration. Refuses to overwrite a module section that is
    /// already present.
    pub fn add_default_module_config<M: ModConfig>(
        &mut self,
        m: &M,
    ) -> CacheResult<()> {
        let map = Self::top_level(m)?;
        if let Some(name) = map.keys().find(|k| self.0.contains_key(*k)) {
            return Err(CacheError::other(format!(
                "Refusing to overwrite conflicting module name: {name}"
            )));
        }
        self.0.extend(map);
        Ok(())
    }

    /// Set (overwrite) the module sections contained in `m`.
    pub fn set_module_config<M: ModConfig>(
        &mut self,
        m: &M,
    ) -> CacheResult<()> {
        self.0.extend(Self::top_level(m)?);
        Ok(())
    }

    /// Extract a module config. Sections not present in this config
    /// take their default values.
    pub fn get_module_config<M: ModConfig>(&self) -> CacheResult<M> {
        tc(&self.0)
    }
}
