use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};

use crate::domain::OrganismId;
use crate::error::MycoError;
use crate::http;

/// Paged access to the JGI `mycocosm_file_list` API. Implementations return
/// the raw JSON body so it can be persisted verbatim.
pub trait FileListClient: Send + Sync {
    fn fetch_page(
        &self,
        organism: &OrganismId,
        page: u32,
        per_page: u32,
    ) -> Result<String, MycoError>;
}

#[derive(Clone)]
pub struct JgiHttpClient {
    client: Client,
    base_url: String,
}

impl JgiHttpClient {
    pub fn new(base_url: &str, token: &str) -> Result<Self, MycoError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(MycoError::MissingToken);
        }
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let mut auth = HeaderValue::from_str(token)
            .map_err(|err| MycoError::InvalidConfig(format!("API token: {err}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = http::build_client(headers, Duration::from_secs(60))?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }
}

impl FileListClient for JgiHttpClient {
    fn fetch_page(
        &self,
        organism: &OrganismId,
        page: u32,
        per_page: u32,
    ) -> Result<String, MycoError> {
        let query = listing_query(organism, page, per_page);
        let response = http::send_with_retries(|| self.client.get(&self.base_url).query(&query))?;
        http::text_or_status(response)
    }
}

/// Query for one page: archived and hidden files excluded, ascending order.
pub fn listing_query(organism: &OrganismId, page: u32, per_page: u32) -> Vec<(&'static str, String)> {
    vec![
        ("organism", organism.to_string()),
        ("api_version", "2".to_string()),
        ("a", "false".to_string()),
        ("h", "false".to_string()),
        ("d", "asc".to_string()),
        ("p", page.to_string()),
        ("x", per_page.to_string()),
        ("t", "simple".to_string()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_carries_page_and_size() {
        let id: OrganismId = "Aspni7".parse().unwrap();
        let query = listing_query(&id, 3, 50);
        assert!(query.contains(&("p", "3".to_string())));
        assert!(query.contains(&("x", "50".to_string())));
        assert!(query.contains(&("organism", "Aspni7".to_string())));
    }

    #[test]
    fn empty_token_is_rejected() {
        let err = JgiHttpClient::new("https://files.jgi.doe.gov/mycocosm_file_list/", " ")
            .err()
            .unwrap();
        assert!(matches!(err, MycoError::MissingToken));
    }
}
