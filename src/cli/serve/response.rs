//! Turning a [`Reply`] into a tiny_http response.

use std::io::{self, Cursor};

use tiny_http::{Header, Request, Response, StatusCode};

use super::router::Reply;
use crate::utils::mime::types::HTML;

/// Send `reply`. Streams use chunked transfer encoding.
pub fn send(request: Request, reply: Reply) -> io::Result<()> {
    match reply {
        Reply::File {
            file,
            len,
            content_type,
            ..
        } => {
            let response = Response::new(
                StatusCode(200),
                content_type_header(content_type),
                file,
                usize::try_from(len).ok(),
                None,
            );
            request.respond(response)
        }
        Reply::Body {
            status,
            content_type,
            body,
        } => {
            let len = body.len();
            let response = Response::new(
                StatusCode(status),
                content_type_header(content_type),
                Cursor::new(body),
                Some(len),
                None,
            );
            request.respond(response)
        }
        Reply::Stream(body) => {
            let response =
                Response::new(StatusCode(200), content_type_header(HTML), body, None, None);
            request.respond(response)
        }
    }
}

fn content_type_header(value: &str) -> Vec<Header> {
    Header::from_bytes("Content-Type", value).into_iter().collect()
}
