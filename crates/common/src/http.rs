// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use bytes::Bytes;
use http::StatusCode;

pub trait RequestPayload {
    fn get_head(&self) -> &(dyn RequestHead + Send + Sync);
    /// The raw body. Interpreting it (and rejecting malformed content) is up to the router.
    fn take_body(&mut self) -> Bytes;
}

#[derive(Debug, Clone, Default)]
pub struct Headers {
    inner: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self { inner: vec![] }
    }

    pub fn from_vec(vec: Vec<(String, String)>) -> Self {
        let mut headers = vec![];
        for (key, value) in vec {
            headers.push((key.to_lowercase(), value));
        }
        Self { inner: headers }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.inner
            .iter()
            .find(|(k, _)| k == &key.to_lowercase())
            .map(|(_, v)| v.clone())
    }

    pub fn insert(&mut self, key: String, value: String) {
        self.inner.push((key.to_lowercase(), value));
    }

    pub fn remove(&mut self, key: &str) {
        self.inner.retain(|(k, _)| k != &key.to_lowercase());
    }
}

impl IntoIterator for Headers {
    type Item = (String, String);
    type IntoIter = std::vec::IntoIter<(String, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.into_iter()
    }
}

pub struct ResponsePayload {
    pub body: ResponseBody,
    pub headers: Headers,
    pub status_code: StatusCode,
}

pub enum ResponseBody {
    Bytes(Vec<u8>),
    None,
}

/// Represents a HTTP request from which information can be extracted
pub trait RequestHead {
    // return all header values that have the following key
    fn get_headers(&self, key: &str) -> Vec<String>;

    // return the first header
    fn get_header(&self, key: &str) -> Option<String> {
        self.get_headers(&key.to_lowercase()).first().cloned()
    }

    /// The raw (still percent-encoded) path, without the query string
    fn get_path(&self) -> String;

    /// Decoded query parameters in request order (a key may appear more than once)
    fn get_query(&self) -> Vec<(String, String)>;

    fn get_method(&self) -> http::Method;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_are_case_insensitive() {
        let mut headers = Headers::from_vec(vec![("Content-Range".into(), "0-1/2".into())]);
        assert_eq!(headers.get("content-range").as_deref(), Some("0-1/2"));

        headers.insert("Prefer".into(), "count=exact".into());
        headers.remove("CONTENT-RANGE");
        assert_eq!(headers.get("content-range"), None);
        assert_eq!(headers.get("prefer").as_deref(), Some("count=exact"));
    }
}
