use serde::Serialize;

#[derive(Serialize)]
pub struct CustomField {
    pub key: String,
    pub value: String,
}

#[derive(Serialize)]
pub struct PostContext {
    pub format: String,
    pub title: String,
    pub date: String,
    pub author: String,
    pub categories: String,
    pub tags: String,
    pub slug: String,
    pub published: bool,
    pub custom_fields: Vec<CustomField>,
    pub content: String,
}

#[derive(Serialize)]
pub struct PageContext {
    pub title: String,
    pub date: String,
    pub author: String,
    pub slug: String,
    pub permalink: String,
    pub published: bool,
    pub custom_fields: Vec<CustomField>,
    pub content: String,
}
