// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

mod request;

use actix_web::{
    HttpRequest, HttpResponse,
    web::{self, ServiceConfig},
};
use bytes::Bytes;
use common::{
    http::{RequestHead, RequestPayload, ResponseBody, ResponsePayload},
    router::Router,
};
use http::StatusCode;
use request::ActixRequestHead;
use rest_resolver::RestRouter;

macro_rules! error_msg {
    ($msg:literal) => {
        concat!("{\"message\":\"", $msg, "\"}").as_bytes()
    };
}

pub fn configure_router(router: web::Data<RestRouter>) -> impl FnOnce(&mut ServiceConfig) {
    move |app| {
        app.app_data(router).default_service(web::to(resolve));
    }
}

struct ActixRequestPayload {
    head: ActixRequestHead,
    body: Bytes,
}

impl RequestPayload for ActixRequestPayload {
    fn get_head(&self) -> &(dyn RequestHead + Send + Sync) {
        &self.head
    }

    fn take_body(&mut self) -> Bytes {
        std::mem::take(&mut self.body)
    }
}

async fn resolve(
    http_request: HttpRequest,
    body: web::Bytes,
    router: web::Data<RestRouter>,
) -> HttpResponse {
    let Ok(method) = http::Method::from_bytes(http_request.method().as_str().as_bytes()) else {
        return HttpResponse::MethodNotAllowed().finish();
    };

    let mut request = ActixRequestPayload {
        head: ActixRequestHead::from_request(&http_request, method),
        body,
    };

    match router.route(&mut request).await {
        Some(ResponsePayload {
            body,
            headers,
            status_code,
        }) => {
            let actix_status_code = match to_actix_status_code(status_code) {
                Ok(status_code) => status_code,
                Err(err) => {
                    tracing::error!("Invalid status code: {}", err);
                    return HttpResponse::InternalServerError()
                        .content_type("application/json")
                        .body(error_msg!("Invalid status code"));
                }
            };

            let mut builder = HttpResponse::build(actix_status_code);

            for header in headers.into_iter() {
                builder.append_header(header);
            }

            match body {
                ResponseBody::Bytes(bytes) => builder.body(bytes),
                ResponseBody::None => builder.finish(),
            }
        }
        None => HttpResponse::NotFound()
            .content_type("application/json")
            .body(error_msg!("Not found")),
    }
}

// Actix uses http-0.2. However, the rest of the system uses
// http-1.x, so we need to convert between the two.
// Once Actix 5.x is released (which uses http-1.x), we can remove this mapping.
fn to_actix_status_code(status_code: StatusCode) -> Result<actix_web::http::StatusCode, String> {
    actix_web::http::StatusCode::from_u16(status_code.as_u16())
        .map_err(|_| "Invalid status code".to_string())
}
