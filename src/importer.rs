use std::borrow::Cow;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

use chrono::NaiveDateTime;
use regex::Regex;
use serde_json::{json, Map, Value};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::frontmatter::{Document, Layout};
use crate::taxonomy::{Taxonomy, TermMap};
use crate::wordpress::Api;

pub const MARKDOWN_EXTENSIONS: [&str; 3] = ["markdown", "md", "mdown"];
pub const FRONTMATTER_DATE_FORMAT: &str = "%Y-%m-%d %H:%M";
const API_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

static ATTRIBUTE_REGEX: OnceLock<Regex> = OnceLock::new();

fn attribute_regex() -> &'static Regex {
    ATTRIBUTE_REGEX.get_or_init(|| {
        Regex::new(r"\{:[ \t]*(.*)\}").expect("failed to compile inline attribute regex")
    })
}

pub fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| MARKDOWN_EXTENSIONS.contains(&e))
}

/// Rewrites kramdown inline attributes (`{: .class #id}`) to the
/// `{.class #id}` form.
pub fn convert_inline_attributes(body: &str) -> Cow<'_, str> {
    attribute_regex().replace_all(body, "{$1}")
}

pub fn parse_date(date: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(date.trim(), FRONTMATTER_DATE_FORMAT)
        .map_err(|_| Error::Date(date.to_string(), "YYYY-MM-DD HH:MM"))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Imported,
    Skipped,
    Failed,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub imported: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl Summary {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Imported => self.imported += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::Failed => self.failed += 1,
        }
    }
}

pub struct Importer<'a> {
    api: &'a dyn Api,
    delay: Duration,
    categories: TermMap,
    tags: TermMap,
}

impl<'a> Importer<'a> {
    /// Loads the site's categories and tags up front.
    pub fn new(api: &'a dyn Api, delay: Duration) -> Result<Importer<'a>> {
        Ok(Importer {
            api,
            delay,
            categories: TermMap::fetch(api, Taxonomy::Categories)?,
            tags: TermMap::fetch(api, Taxonomy::Tags)?,
        })
    }

    /// Imports every markdown file below `folder`, one at a time.
    pub fn run(&mut self, folder: &Path) -> Summary {
        let mut summary = Summary::default();

        for entry in WalkDir::new(folder).sort_by_file_name() {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    log::warn!("Could not read directory entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() || !is_markdown(entry.path()) {
                continue;
            }

            // Keeps us under the site's request rate limit.
            if !self.delay.is_zero() {
                thread::sleep(self.delay);
            }

            summary.record(self.import_file(entry.path()));
        }

        summary
    }

    pub fn import_file(&mut self, path: &Path) -> Outcome {
        let source = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                log::error!("Could not read {}: {}, skipping.", path.display(), e);
                return Outcome::Skipped;
            }
        };
        let doc = match Document::parse(&source) {
            Ok(d) => d,
            Err(e) => {
                log::error!("Cannot parse YAML frontmatter for {}: {}, skipping.", path.display(), e);
                return Outcome::Skipped;
            }
        };

        match doc.frontmatter.layout() {
            Some(Layout::Post) => self.import_post(&doc),
            Some(Layout::Page) => self.import_page(&doc),
            None => {
                log::warn!("Layout not detected for {}, skipping.", path.display());
                Outcome::Skipped
            }
        }
    }

    fn import_post(&mut self, doc: &Document) -> Outcome {
        log::info!("Importing Post: {} ...", doc.title().unwrap_or_default());
        let Some(mut data) = common_fields(doc) else {
            return Outcome::Skipped;
        };

        let fm = &doc.frontmatter;
        if let Some(categories) = &fm.categories {
            let ids = self.categories.resolve_all(self.api, &categories.names());
            data.insert("categories".into(), json!(ids));
        }
        if let Some(tags) = &fm.tags {
            let ids = self.tags.resolve_all(self.api, &tags.names());
            data.insert("tags".into(), json!(ids));
        }

        if fm.is_link() {
            data.insert("format".into(), json!("link"));
            match fm.external_url.as_deref().filter(|u| !u.is_empty()) {
                Some(url) => {
                    data.insert("meta".into(), json!({ "external_url": url }));
                }
                None => log::warn!("Expected external-url for post type Link, did not find."),
            }
        }

        self.submit("posts", doc, data)
    }

    fn import_page(&mut self, doc: &Document) -> Outcome {
        log::info!("Importing Page: {} ...", doc.title().unwrap_or_default());
        let Some(data) = common_fields(doc) else {
            return Outcome::Skipped;
        };

        self.submit("pages", doc, data)
    }

    fn submit(&self, resource: &str, doc: &Document, data: Map<String, Value>) -> Outcome {
        match self.api.post(resource, &Value::Object(data)) {
            Ok(_) => Outcome::Imported,
            Err(e) => {
                log::error!("Error importing {}: {}", doc.title().unwrap_or_default(), e);
                Outcome::Failed
            }
        }
    }
}

/// Fields shared by posts and pages. `None` when the title or the content is
/// missing.
fn common_fields(doc: &Document) -> Option<Map<String, Value>> {
    let (Some(title), Some(content)) = (doc.title(), doc.content()) else {
        log::warn!("Post does not have a title or content, skipping.");
        return None;
    };

    let mut data = Map::new();
    data.insert("title".into(), json!(title));
    data.insert("content".into(), json!(convert_inline_attributes(content)));

    if let Some(date) = &doc.frontmatter.date {
        match parse_date(date) {
            Ok(d) => {
                data.insert("date".into(), json!(d.format(API_DATE_FORMAT).to_string()));
            }
            Err(e) => log::warn!("{}; leaving the date unset.", e),
        }
    }
    if let Some(slug) = doc.frontmatter.slug.as_deref().filter(|s| !s.is_empty()) {
        data.insert("slug".into(), json!(slug));
    }
    data.insert("status".into(), json!("publish"));

    Some(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wordpress::fake::FakeSite;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, contents).unwrap();
        path
    }

    fn import(site: &FakeSite, contents: &str) -> Outcome {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "doc.markdown", contents);
        Importer::new(site, Duration::ZERO).unwrap().import_file(&path)
    }

    #[test]
    fn recognizes_markdown_extensions() {
        assert!(is_markdown(Path::new("a/b.markdown")));
        assert!(is_markdown(Path::new("b.md")));
        assert!(is_markdown(Path::new("b.mdown")));
        assert!(!is_markdown(Path::new("b.txt")));
        assert!(!is_markdown(Path::new("md")));
    }

    #[test]
    fn converts_inline_attributes() {
        assert_eq!(
            convert_inline_attributes("![img](a.png)\n{: .wide #hero}\ntext"),
            "![img](a.png)\n{.wide #hero}\ntext"
        );
        assert_eq!(convert_inline_attributes("{ plain }"), "{ plain }");
    }

    #[test]
    fn imports_post_with_all_fields() {
        let site = FakeSite::new().with_term("categories", 1, "Rust");
        let outcome = import(
            &site,
            indoc! {"
                ---
                layout: post
                title: Hello
                date: 2020-01-02 03:04
                slug: hello
                categories: Rust, Travel
                tags: [one]
                ---
                Hi {: .note}
            "},
        );

        assert_eq!(outcome, Outcome::Imported);
        let posts = site.posts.borrow();
        let post = &posts[0];
        assert_eq!(post["title"], "Hello");
        assert_eq!(post["content"], "Hi {.note}\n");
        assert_eq!(post["date"], "2020-01-02T03:04:00");
        assert_eq!(post["slug"], "hello");
        assert_eq!(post["status"], "publish");

        let travel = post["categories"][1].as_u64().unwrap();
        assert_eq!(post["categories"][0], 1);
        assert_eq!(site.categories.borrow()[&travel], "Travel");
        assert_eq!(post["tags"].as_array().unwrap().len(), 1);
        assert!(post.get("format").is_none());
    }

    #[test]
    fn link_post_carries_external_url() {
        let site = FakeSite::new();
        import(
            &site,
            "---\nlayout: post\ntitle: Link\ntype: link\nexternal-url: https://rust-lang.org\n---\nSee this.\n",
        );

        let posts = site.posts.borrow();
        assert_eq!(posts[0]["format"], "link");
        assert_eq!(posts[0]["meta"]["external_url"], "https://rust-lang.org");
    }

    #[test]
    fn link_post_without_url_is_still_imported() {
        let site = FakeSite::new();
        let outcome = import(&site, "---\nlayout: post\ntitle: Link\ntype: link\n---\nSee this.\n");

        assert_eq!(outcome, Outcome::Imported);
        assert!(site.posts.borrow()[0].get("meta").is_none());
    }

    #[test]
    fn missing_title_or_body_is_skipped_without_request() {
        let site = FakeSite::new();

        assert_eq!(import(&site, "---\nlayout: post\n---\nBody only.\n"), Outcome::Skipped);
        assert_eq!(import(&site, "---\nlayout: post\ntitle: Empty\n---\n"), Outcome::Skipped);
        assert_eq!(import(&site, "---\nlayout: page\ntitle: Empty\n---\n\n"), Outcome::Skipped);

        assert_eq!(site.calls_to("POST", "posts"), 0);
        assert_eq!(site.calls_to("POST", "pages"), 0);
    }

    #[test]
    fn malformed_date_is_dropped() {
        let site = FakeSite::new();
        let outcome = import(&site, "---\nlayout: page\ntitle: About\ndate: 02/01/2020\n---\nMe.\n");

        assert_eq!(outcome, Outcome::Imported);
        let pages = site.pages.borrow();
        assert!(pages[0].get("date").is_none());
        assert_eq!(pages[0]["title"], "About");
    }

    #[test]
    fn page_has_no_taxonomy() {
        let site = FakeSite::new();
        import(&site, "---\nlayout: page\ntitle: About\ncategories: a\n---\nMe.\n");

        assert!(site.pages.borrow()[0].get("categories").is_none());
        assert_eq!(site.calls_to("POST", "categories"), 0);
    }

    #[test]
    fn unknown_layout_and_bad_yaml_are_skipped() {
        let site = FakeSite::new();

        assert_eq!(import(&site, "---\nlayout: draft\ntitle: x\n---\nbody\n"), Outcome::Skipped);
        assert_eq!(import(&site, "no frontmatter at all\n"), Outcome::Skipped);
        assert_eq!(import(&site, "---\ntitle: [broken\n---\nbody\n"), Outcome::Skipped);
        assert!(site.posts.borrow().is_empty());
    }

    #[test]
    fn joined_and_listed_terms_resolve_the_same() {
        let joined = FakeSite::new();
        import(&joined, "---\nlayout: post\ntitle: A\ntags: \"a, b,c\"\n---\nx\n");
        let listed = FakeSite::new();
        import(&listed, "---\nlayout: post\ntitle: A\ntags: [a, b, c]\n---\nx\n");

        let names = |site: &FakeSite| site.tags.borrow().values().cloned().collect::<Vec<_>>();
        assert_eq!(names(&joined), ["a", "b", "c"]);
        assert_eq!(names(&joined), names(&listed));
    }

    #[test]
    fn failed_submission_does_not_stop_the_run() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.md", "---\nlayout: post\ntitle: A\n---\nx\n");
        write(dir.path(), "nested/b.mdown", "---\nlayout: page\ntitle: B\n---\ny\n");
        write(dir.path(), "c.markdown", "---\nlayout: post\ntitle: C\n---\nz\n");
        write(dir.path(), "notes.txt", "---\nlayout: post\ntitle: T\n---\nz\n");

        let site = FakeSite::new().failing("posts");
        let summary = Importer::new(&site, Duration::ZERO).unwrap().run(dir.path());

        assert_eq!(
            summary,
            Summary {
                imported: 1,
                skipped: 0,
                failed: 2,
            }
        );
        assert_eq!(site.pages.borrow()[0]["title"], "B");
        assert_eq!(site.calls_to("POST", "posts"), 2);
    }

    #[test]
    fn repeated_new_tag_is_created_once() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "1.md", "---\nlayout: post\ntitle: One\ntags: shiny\n---\nx\n");
        write(dir.path(), "2.md", "---\nlayout: post\ntitle: Two\ntags: shiny\n---\ny\n");

        let site = FakeSite::new();
        let summary = Importer::new(&site, Duration::ZERO).unwrap().run(dir.path());

        assert_eq!(summary.imported, 2);
        assert_eq!(site.calls_to("POST", "tags"), 1);
        let posts = site.posts.borrow();
        assert_eq!(posts[0]["tags"], posts[1]["tags"]);
    }
}
