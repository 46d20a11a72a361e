use std::collections::HashMap;
use std::fmt;

use serde::Deserialize;
use serde_json::json;

use crate::error::{Error, Result};
use crate::wordpress::Api;

/// Only the first page of terms is fetched.
pub const TERMS_PER_PAGE: usize = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Taxonomy {
    Categories,
    Tags,
}

impl Taxonomy {
    pub fn resource(self) -> &'static str {
        match self {
            Taxonomy::Categories => "categories",
            Taxonomy::Tags => "tags",
        }
    }
}

impl fmt::Display for Taxonomy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.resource())
    }
}

#[derive(Debug, Deserialize)]
pub struct Term {
    pub id: u64,
    pub name: String,
}

/// A snapshot of one taxonomy's terms on the site, keyed by name.
#[derive(Debug)]
pub struct TermMap {
    taxonomy: Taxonomy,
    ids: HashMap<String, u64>,
}

impl TermMap {
    pub fn fetch(api: &dyn Api, taxonomy: Taxonomy) -> Result<TermMap> {
        let response = api.get(
            taxonomy.resource(),
            &[("per_page", TERMS_PER_PAGE.to_string())],
        )?;
        let terms: Vec<Term> = serde_json::from_value(response)?;
        log::debug!("Loaded {} site {}", terms.len(), taxonomy);

        Ok(TermMap {
            taxonomy,
            ids: terms.into_iter().map(|t| (t.name, t.id)).collect(),
        })
    }

    pub fn get(&self, name: &str) -> Option<u64> {
        self.ids.get(name).copied()
    }

    /// Looks `name` up, creating the term on the site when it does not exist
    /// yet. After a creation the snapshot is fetched again so later lookups
    /// see the new term.
    pub fn resolve(&mut self, api: &dyn Api, name: &str) -> Result<u64> {
        if let Some(id) = self.get(name) {
            return Ok(id);
        }

        let created = api.post(self.taxonomy.resource(), &json!({ "name": name }))?;
        let id = created["id"].as_u64().ok_or(Error::MissingField("id"))?;
        log::info!("Created {} term '{}' ({})", self.taxonomy, name, id);

        match TermMap::fetch(api, self.taxonomy) {
            Ok(fresh) => self.ids = fresh.ids,
            Err(e) => log::warn!("Could not reload site {}: {}", self.taxonomy, e),
        }
        // The reload only sees the first page, so keep the new term regardless.
        self.ids.insert(name.to_string(), id);

        Ok(id)
    }

    /// Resolves every name, dropping (and logging) those that fail.
    pub fn resolve_all(&mut self, api: &dyn Api, names: &[String]) -> Vec<u64> {
        let mut ids = Vec::with_capacity(names.len());
        for name in names {
            match self.resolve(api, name) {
                Ok(id) => ids.push(id),
                Err(e) => log::error!("Error adding new {} term '{}': {}", self.taxonomy, name, e),
            }
        }
        ids
    }
}
