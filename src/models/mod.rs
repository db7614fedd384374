// src/models/mod.rs

use serde::{Deserialize, Deserializer};

pub mod answer;
pub mod attachment;
pub mod draft;
pub mod invitation;
pub mod participation;
pub mod question_type;
pub mod report;
pub mod survey;

/// Treats an explicit JSON `null` like a missing field.
/// Frontends send `"options": null` for question types without options.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
