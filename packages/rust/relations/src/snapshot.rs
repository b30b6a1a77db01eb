//! JSON snapshots of service state in the snapshot store.

use serde::Serialize;
use serde::de::DeserializeOwned;

use gransk_core::Injector;
use gransk_shared::{GranskError, Result};

/// Serialize `state` for [`save`].
pub fn encode<T: Serialize>(name: &str, state: &T) -> Result<String> {
    serde_json::to_string(state)
        .map_err(|e| GranskError::Storage(format!("encode {name} snapshot: {e}")))
}

/// Read the last saved state of service `name`.
pub async fn load<T: DeserializeOwned>(injector: &Injector, name: &str) -> Result<Option<T>> {
    let store = injector.snapshot_store().await?;
    let Some(json) = store.load_snapshot(name).await? else {
        return Ok(None);
    };
    let state = serde_json::from_str(&json)
        .map_err(|e| GranskError::parse(format!("{name} snapshot: {e}")))?;
    Ok(Some(state))
}

pub async fn save(injector: &Injector, name: &str, json: String) -> Result<()> {
    let store = injector.snapshot_store().await?;
    store.save_snapshot(name, &json).await
}

pub async fn delete(injector: &Injector, name: &str) -> Result<()> {
    let store = injector.snapshot_store().await?;
    store.delete_snapshot(name).await
}
