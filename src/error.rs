use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{resource} returned HTTP {status}: {body}")]
    Status {
        resource: String,
        status: u16,
        body: String,
    },

    #[error("unexpected response shape: {0}")]
    Json(#[from] serde_json::Error),

    #[error("could not parse frontmatter: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("date {0:?} is not in the expected format {1}")]
    Date(String, &'static str),

    #[error("could not render template: {0}")]
    Template(#[from] tinytemplate::error::Error),

    #[error("response is missing field `{0}`")]
    MissingField(&'static str),
}
