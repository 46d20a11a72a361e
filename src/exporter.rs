use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use tinytemplate::TinyTemplate;

use crate::contexts::{CustomField, PageContext, PostContext};
use crate::error::{Error, Result};
use crate::importer::FRONTMATTER_DATE_FORMAT;
use crate::post::RemoteItem;
use crate::wordpress::Api;

pub const PAGE_SIZE: usize = 10;

/// Keys each template writes itself. A custom field with one of these names
/// would repeat the key and the file would no longer parse.
const POST_KEYS: &[&str] = &[
    "layout", "type", "title", "date", "author", "categories", "tags", "slug", "published",
];
const PAGE_KEYS: &[&str] = &["layout", "title", "date", "author", "slug", "permalink", "published"];

const POST_TEMPLATE: &str = "---
layout: post
type: {format | yaml}
title: {title | yaml}
date: {date}
author: {author | yaml}
categories: {categories | yaml}
tags: {tags | yaml}
slug: {slug | yaml}
published: {published}
{{ for field in custom_fields }}{field.key | yaml}: {field.value | yaml}
{{ endfor }}---
{content}";

const PAGE_TEMPLATE: &str = "---
layout: page
title: {title | yaml}
date: {date}
author: {author | yaml}
slug: {slug | yaml}
permalink: {permalink | yaml}
published: {published}
{{ for field in custom_fields }}{field.key | yaml}: {field.value | yaml}
{{ endfor }}---
{content}";

static HOST_REGEX: OnceLock<Regex> = OnceLock::new();

fn host_regex() -> &'static Regex {
    HOST_REGEX.get_or_init(|| Regex::new(r"^https?://[^/]*").expect("failed to compile host regex"))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
    Posts,
    Pages,
}

impl Kind {
    fn resource(self) -> &'static str {
        match self {
            Kind::Posts => "posts",
            Kind::Pages => "pages",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub requests: usize,
    pub written: usize,
    pub failed: usize,
}

pub struct Exporter<'a> {
    api: &'a dyn Api,
    root: PathBuf,
    site: String,
    templates: TinyTemplate<'static>,
}

impl<'a> Exporter<'a> {
    /// Creates the output folder. Failing to do so is fatal for the export.
    pub fn new(api: &'a dyn Api, root: &Path, site: &str) -> Result<Exporter<'a>> {
        fs::create_dir_all(root)?;

        let mut templates = TinyTemplate::new();
        templates.set_default_formatter(&tinytemplate::format_unescaped);
        templates.add_formatter("yaml", yaml_formatter);
        templates.add_template("post", POST_TEMPLATE)?;
        templates.add_template("page", PAGE_TEMPLATE)?;

        Ok(Exporter {
            api,
            root: root.to_path_buf(),
            site: site.trim_end_matches('/').to_string(),
            templates,
        })
    }

    /// Exports every post, then every page.
    pub fn run(&self) -> Result<Summary> {
        let posts = self.sweep(Kind::Posts)?;
        let pages = self.sweep(Kind::Pages)?;

        Ok(Summary {
            requests: posts.requests + pages.requests,
            written: posts.written + pages.written,
            failed: posts.failed + pages.failed,
        })
    }

    /// Pages through one resource until the site returns an empty page.
    pub fn sweep(&self, kind: Kind) -> Result<Summary> {
        let mut summary = Summary::default();
        let mut offset = 0;

        loop {
            let response = self.api.get(
                kind.resource(),
                &[
                    ("per_page", PAGE_SIZE.to_string()),
                    ("offset", offset.to_string()),
                    ("context", "edit".to_string()),
                ],
            )?;
            summary.requests += 1;

            let items: Vec<Value> = serde_json::from_value(response)?;
            if items.is_empty() {
                break;
            }

            for value in items {
                let item: RemoteItem = match serde_json::from_value(value) {
                    Ok(i) => i,
                    Err(e) => {
                        log::error!("Unreadable entry in {}: {}", kind.resource(), e);
                        summary.failed += 1;
                        continue;
                    }
                };
                let written = match kind {
                    Kind::Posts => self.export_post(&item),
                    Kind::Pages => self.export_page(&item),
                };
                match written {
                    Ok(_) => summary.written += 1,
                    Err(e) => {
                        log::error!("Error exporting {} {}: {}", kind.resource(), item.id, e);
                        summary.failed += 1;
                    }
                }
            }

            offset += PAGE_SIZE;
        }

        Ok(summary)
    }

    pub fn export_post(&self, post: &RemoteItem) -> Result<PathBuf> {
        let date = post.date()?;
        let context = PostContext {
            format: post.format.clone().unwrap_or_else(|| "standard".to_string()),
            title: post.title.text().to_string(),
            date: date.format(FRONTMATTER_DATE_FORMAT).to_string(),
            author: self.author(post.author),
            categories: self.term_names("categories", &post.categories),
            tags: self.term_names("tags", &post.tags),
            slug: post.slug.clone(),
            published: post.is_published(),
            custom_fields: custom_fields(post, POST_KEYS),
            content: post.content.text().to_string(),
        };
        let output = self.templates.render("post", &context)?;

        let dir = self.root.join("posts");
        fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{}-{}.markdown", date.format("%Y-%m-%d"), post.slug));
        log::info!("Writing post to file: {}", path.display());
        fs::write(&path, output)?;

        Ok(path)
    }

    pub fn export_page(&self, page: &RemoteItem) -> Result<PathBuf> {
        let date = page.date()?;
        let permalink = self.permalink(page.link.as_deref().unwrap_or_default());
        let content = if page.content.protected {
            String::new()
        } else {
            page.content.text().to_string()
        };
        let context = PageContext {
            title: page.title.text().to_string(),
            date: date.format(FRONTMATTER_DATE_FORMAT).to_string(),
            author: self.author(page.author),
            slug: page.slug.clone(),
            permalink: permalink.clone(),
            published: page.is_published(),
            custom_fields: custom_fields(page, PAGE_KEYS),
            content,
        };
        let output = self.templates.render("page", &context)?;

        let dir = relative_dir(&self.root.join("pages"), &permalink);
        fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{}.markdown", page.slug));
        log::info!("Writing page to file: {}", path.display());
        fs::write(&path, output)?;

        Ok(path)
    }

    /// The page link with the site's base URL removed.
    pub fn permalink(&self, link: &str) -> String {
        match link.strip_prefix(&self.site) {
            Some(rest) if !self.site.is_empty() && (rest.is_empty() || rest.starts_with('/')) => {
                rest.to_string()
            }
            _ => host_regex().replace(link, "").into_owned(),
        }
    }

    fn author(&self, id: u64) -> String {
        match self.lookup_name(&format!("users/{}", id)) {
            Ok(name) => name,
            Err(e) => {
                log::warn!("Could not look up author {}: {}", id, e);
                String::new()
            }
        }
    }

    /// Names of the given term ids, joined with `, `. One request per term.
    fn term_names(&self, taxonomy: &str, ids: &[u64]) -> String {
        let mut names = Vec::with_capacity(ids.len());
        for id in ids {
            match self.lookup_name(&format!("{}/{}", taxonomy, id)) {
                Ok(name) => names.push(name),
                Err(e) => log::warn!("Could not look up {} {}: {}", taxonomy, id, e),
            }
        }
        names.join(", ")
    }

    fn lookup_name(&self, resource: &str) -> Result<String> {
        let response = self.api.get(resource, &[])?;
        response["name"]
            .as_str()
            .map(String::from)
            .ok_or(Error::MissingField("name"))
    }
}

fn custom_fields(item: &RemoteItem, reserved: &[&str]) -> Vec<CustomField> {
    item.public_fields()
        .filter(|(key, _)| {
            let clashes = reserved.contains(key);
            if clashes {
                log::warn!("Skipping custom field '{}' of {}: it shadows a frontmatter key", key, item.id);
            }
            !clashes
        })
        .map(|(key, value)| CustomField {
            key: key.to_string(),
            value: value.to_string(),
        })
        .collect()
}

/// `base` joined with the plain components of `permalink`, so a link cannot
/// point outside the output folder.
fn relative_dir(base: &Path, permalink: &str) -> PathBuf {
    let mut dir = base.to_path_buf();
    for component in Path::new(permalink).components() {
        if let Component::Normal(part) = component {
            dir.push(part);
        }
    }
    dir
}

/// Whether a string must be quoted to read back as the same YAML string.
fn needs_quotes(s: &str) -> bool {
    const INDICATORS: &[char] = &[
        '-', '?', ':', ',', '[', ']', '{', '}', '#', '&', '*', '!', '|', '>', '\'', '"', '%', '@',
        '`',
    ];
    const KEYWORDS: &[&str] = &["true", "false", "yes", "no", "on", "off", "null", "~"];

    if s.is_empty() {
        return false;
    }
    s.trim() != s
        || s.starts_with(INDICATORS)
        || s.ends_with(':')
        || s.contains(": ")
        || s.contains(" #")
        || s.contains(['\n', '\r', '\t'])
        || KEYWORDS.contains(&s.to_ascii_lowercase().as_str())
        || s.parse::<f64>().is_ok()
}

fn yaml_formatter(value: &Value, output: &mut String) -> tinytemplate::error::Result<()> {
    match value {
        Value::String(s) if needs_quotes(s) => {
            // A JSON string is a valid double-quoted YAML scalar.
            let quoted = serde_json::to_string(s).map_err(|e| {
                tinytemplate::error::Error::GenericError { msg: e.to_string() }
            })?;
            output.push_str(&quoted);
            Ok(())
        }
        _ => tinytemplate::format_unescaped(value, output),
    }
}
