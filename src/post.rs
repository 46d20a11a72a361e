use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer};

use crate::error::{Error, Result};

pub const REMOTE_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A `{ raw, rendered, protected }` object as the REST API returns it for
/// titles and content. `raw` is only present in the `edit` context.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Rendered {
    pub raw: Option<String>,
    pub rendered: String,
    pub protected: bool,
}

impl Rendered {
    pub fn text(&self) -> &str {
        self.raw.as_deref().unwrap_or(&self.rendered)
    }
}

/// A post or page as listed by the site.
#[derive(Clone, Debug, Deserialize)]
pub struct RemoteItem {
    pub id: u64,
    pub date: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub author: u64,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub title: Rendered,
    #[serde(default)]
    pub content: Rendered,
    #[serde(default)]
    pub categories: Vec<u64>,
    #[serde(default)]
    pub tags: Vec<u64>,
    #[serde(default, deserialize_with = "from_custom_fields")]
    pub custom_fields: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub link: Option<String>,
}

/// PHP encodes an empty meta array as `[]`, so a list reads as no fields.
fn from_custom_fields<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<String, Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum FieldsOrList {
        Fields(BTreeMap<String, Vec<String>>),
        List(Vec<serde_json::Value>),
    }

    match Option::<FieldsOrList>::deserialize(deserializer)? {
        Some(FieldsOrList::Fields(fields)) => Ok(fields),
        Some(FieldsOrList::List(items)) if !items.is_empty() => Err(D::Error::custom(
            "custom_fields is a non-empty list, expected an object",
        )),
        Some(FieldsOrList::List(_)) | None => Ok(BTreeMap::new()),
    }
}

impl RemoteItem {
    pub fn date(&self) -> Result<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.date, REMOTE_DATE_FORMAT)
            .map_err(|_| Error::Date(self.date.clone(), "YYYY-MM-DDTHH:MM:SS"))
    }

    pub fn is_published(&self) -> bool {
        self.status == "publish"
    }

    /// Custom fields with their first value, leaving out WordPress' own
    /// underscore-prefixed metadata.
    pub fn public_fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.custom_fields
            .iter()
            .filter(|(key, _)| !key.starts_with('_'))
            .filter_map(|(key, values)| values.first().map(|v| (key.as_str(), v.as_str())))
    }
}
