//! Helpers shared by the HTTP integration tests.

use wiremock::{Match, Request};

/// Matches requests for one API operation, with or without extra query pairs.
///
/// Every endpoint is served from `/index.php` with the operation in the
/// query string, so the path alone cannot tell requests apart.
pub struct Operation(String);

impl Match for Operation {
    fn matches(&self, request: &Request) -> bool {
        let expected = format!("/api/v2/{}", self.0);
        request
            .url
            .query()
            .is_some_and(|q| q == expected || q.starts_with(&format!("{}&", expected)))
    }
}

pub fn operation(name: &str) -> Operation {
    Operation(name.to_string())
}
