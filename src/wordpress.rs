use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;

use crate::error::{Error, Result};

/// The subset of the WordPress REST API the importer and exporter talk to.
///
/// `resource` is a path below `wp/v2`, e.g. `posts`, `tags` or `users/3`.
pub trait Api {
    fn get(&self, resource: &str, params: &[(&str, String)]) -> Result<Value>;
    fn post(&self, resource: &str, body: &Value) -> Result<Value>;
}

pub struct WordPress {
    client: Client,
    base: String,
    username: String,
    password: String,
}

impl WordPress {
    pub fn new(site: &str, username: &str, password: &str) -> Result<WordPress> {
        let client = Client::builder()
            .user_agent(concat!("md2wp/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(WordPress {
            client,
            base: format!("{}/wp-json/wp/v2", site.trim_end_matches('/')),
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    fn url(&self, resource: &str) -> String {
        format!("{}/{}", self.base, resource.trim_start_matches('/'))
    }

    fn read(resource: &str, response: reqwest::blocking::Response) -> Result<Value> {
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                resource: resource.to_string(),
                status: status.as_u16(),
                body: response.text().unwrap_or_default(),
            });
        }
        Ok(response.json()?)
    }
}

impl Api for WordPress {
    fn get(&self, resource: &str, params: &[(&str, String)]) -> Result<Value> {
        log::debug!("GET {} {:?}", resource, params);
        let response = self
            .client
            .get(self.url(resource))
            .basic_auth(&self.username, Some(&self.password))
            .query(params)
            .send()?;
        WordPress::read(resource, response)
    }

    fn post(&self, resource: &str, body: &Value) -> Result<Value> {
        log::debug!("POST {}", resource);
        let response = self
            .client
            .post(self.url(resource))
            .basic_auth(&self.username, Some(&self.password))
            .header(CONTENT_TYPE, "application/json; charset=UTF-8")
            .body(serde_json::to_vec(body)?)
            .send()?;
        WordPress::read(resource, response)
    }
}
