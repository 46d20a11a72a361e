use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use crate::error::Result;

static YAML_REGEX: OnceLock<Regex> = OnceLock::new();

fn yaml_regex() -> &'static Regex {
    YAML_REGEX.get_or_init(|| {
        let pattern = r"\A[[:space:]]*---[ \t]*\r?\n((?:(?s:.*?)\r?\n)??)---[ \t]*(?:\r?\n((?s:.*)))?\z";
        Regex::new(pattern).expect("failed to compile regex for YAML front matter")
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Layout {
    Post,
    Page,
}

impl FromStr for Layout {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Layout, ()> {
        match s {
            "post" => Ok(Layout::Post),
            "page" => Ok(Layout::Page),
            _ => Err(()),
        }
    }
}

/// One category or tag name. YAML reads `2020` or `true` as non-strings, so
/// scalars are taken as written.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(try_from = "serde_yaml::Value")]
pub struct Name(String);

impl TryFrom<serde_yaml::Value> for Name {
    type Error = String;

    fn try_from(value: serde_yaml::Value) -> std::result::Result<Name, String> {
        use serde_yaml::Value;

        match value {
            Value::String(s) => Ok(Name(s)),
            Value::Number(n) => Ok(Name(n.to_string())),
            Value::Bool(b) => Ok(Name(b.to_string())),
            Value::Null => Ok(Name(String::new())),
            _ => Err("expected a category or tag name".to_string()),
        }
    }
}

/// Categories or tags, written either as `a, b` or as a YAML sequence.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Terms {
    Joined(Name),
    List(Vec<Name>),
}

impl Terms {
    /// Every name, trimmed, with empty names dropped. Only the joined form is
    /// split on commas; a list item is always one name.
    pub fn names(&self) -> Vec<String> {
        let parts: Vec<&str> = match self {
            Terms::Joined(Name(s)) => s.split(',').collect(),
            Terms::List(items) => items.iter().map(|Name(n)| n.as_str()).collect(),
        };
        parts
            .into_iter()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(String::from)
            .collect()
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Frontmatter {
    pub layout: Option<String>,
    pub title: Option<String>,
    pub date: Option<String>,
    pub slug: Option<String>,
    pub categories: Option<Terms>,
    pub tags: Option<Terms>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(rename = "external-url")]
    pub external_url: Option<String>,
}

impl Frontmatter {
    pub fn layout(&self) -> Option<Layout> {
        self.layout.as_deref().and_then(|l| l.trim().parse().ok())
    }

    pub fn is_link(&self) -> bool {
        self.kind.as_deref() == Some("link")
    }
}

/// A markdown file split into its frontmatter and body.
#[derive(Clone, Debug)]
pub struct Document {
    pub frontmatter: Frontmatter,
    pub body: String,
}

impl Document {
    pub fn parse(source: &str) -> Result<Document> {
        let Some(captures) = yaml_regex().captures(source) else {
            return Ok(Document {
                frontmatter: Frontmatter::default(),
                body: source.to_string(),
            });
        };

        let raw = captures.get(1).map_or("", |m| m.as_str());
        let body = captures.get(2).map_or("", |m| m.as_str());

        // An empty block deserializes as YAML null.
        let frontmatter = if raw.trim().is_empty() {
            Frontmatter::default()
        } else {
            serde_yaml::from_str(raw)?
        };

        Ok(Document {
            frontmatter,
            body: body.to_string(),
        })
    }

    /// The title, if present and not blank.
    pub fn title(&self) -> Option<&str> {
        self.frontmatter
            .title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
    }

    /// The body, if it holds anything besides whitespace.
    pub fn content(&self) -> Option<&str> {
        Some(self.body.as_str()).filter(|b| !b.trim().is_empty())
    }
}
