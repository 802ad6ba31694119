// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use actix_web::{HttpRequest, http::header::HeaderMap};
use common::http::RequestHead;

pub struct ActixRequestHead {
    // we cannot refer to HttpRequest directly, as it holds an Rc (and therefore does
    // not impl Send or Sync)
    headers: HeaderMap,
    method: http::Method,
    path: String,
    query: Vec<(String, String)>,
}

impl ActixRequestHead {
    /// `method` is already converted, as Actix uses http-0.2 while the rest of the system uses
    /// http-1.x
    pub fn from_request(req: &HttpRequest, method: http::Method) -> ActixRequestHead {
        ActixRequestHead {
            headers: req.headers().clone(),
            method,
            path: req.path().to_string(),
            query: url::form_urlencoded::parse(req.query_string().as_bytes())
                .into_owned()
                .collect(),
        }
    }
}

impl RequestHead for ActixRequestHead {
    fn get_headers(&self, key: &str) -> Vec<String> {
        self.headers
            .get_all(key.to_lowercase())
            .filter_map(|h| h.to_str().ok().map(|h| h.to_string()))
            .collect()
    }

    fn get_method(&self) -> http::Method {
        self.method.clone()
    }

    fn get_path(&self) -> String {
        self.path.clone()
    }

    fn get_query(&self) -> Vec<(String, String)> {
        self.query.clone()
    }
}

#[cfg(test)]
mod tests {
    use actix_web::test::TestRequest;

    use super::*;

    #[test]
    fn query_keeps_order_and_duplicates() {
        let req = TestRequest::get()
            .uri("/rest/v1/cities?age=gt.1&select=name%2Ccountries(name)&age=lt.9")
            .insert_header(("Prefer", "count=exact"))
            .insert_header(("Prefer", "resolution=merge-duplicates"))
            .to_http_request();

        let head = ActixRequestHead::from_request(&req, http::Method::GET);

        assert_eq!(head.get_path(), "/rest/v1/cities");
        assert_eq!(
            head.get_query(),
            vec![
                ("age".to_string(), "gt.1".to_string()),
                ("select".to_string(), "name,countries(name)".to_string()),
                ("age".to_string(), "lt.9".to_string()),
            ]
        );
        assert_eq!(
            head.get_headers("prefer"),
            vec!["count=exact".to_string(), "resolution=merge-duplicates".to_string()]
        );
    }
}
