use std::io::Cursor;

use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::http::request::Parts;
use hyper::{Response, StatusCode};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use tracing::error;

use crate::proxy::ResponseBody;

const WEBDAV_METHODS: &[&str] = &[
    "PROPFIND",
    "PROPPATCH",
    "MKCOL",
    "COPY",
    "MOVE",
    "LOCK",
    "UNLOCK",
    "REPORT",
    "SEARCH",
];

const WEBDAV_HEADERS: &[&str] = &["depth", "destination", "overwrite", "lock-token"];

const WEBDAV_PATH_PREFIXES: &[&str] = &["/remote.php/webdav", "/remote.php/dav", "/webdav", "/dav"];

const XML_CONTENT_TYPE: &str = "application/xml; charset=utf-8";
const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaultCode {
    PermissionDenied,
}

impl FaultCode {
    pub fn error_code(self) -> &'static str {
        match self {
            FaultCode::PermissionDenied => "permission-denied",
        }
    }

    pub fn exception(self) -> &'static str {
        match self {
            FaultCode::PermissionDenied => "Sabre\\DAV\\Exception\\PermissionDenied",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProtocolFault {
    pub code: FaultCode,
    pub message: String,
}

impl ProtocolFault {
    pub fn authentication_error() -> Self {
        Self {
            code: FaultCode::PermissionDenied,
            message: "Authentication error".to_string(),
        }
    }

    pub fn to_xml(&self) -> Result<String, quick_xml::Error> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        let mut root = BytesStart::new("d:error");
        root.push_attribute(("xmlns:d", "DAV:"));
        root.push_attribute(("xmlns:s", "http://sabredav.org/ns"));
        writer.write_event(Event::Start(root))?;

        write_text_element(&mut writer, "s:exception", self.code.exception())?;
        write_text_element(&mut writer, "s:errorcode", self.code.error_code())?;
        write_text_element(&mut writer, "s:message", &self.message)?;

        writer.write_event(Event::End(BytesEnd::new("d:error")))?;

        let bytes = writer.into_inner().into_inner();
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

fn write_text_element(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    name: &str,
    text: &str,
) -> Result<(), quick_xml::Error> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// A request is treated as WebDAV when any of the method, headers or path say so.
pub fn is_webdav_request(parts: &Parts) -> bool {
    WEBDAV_METHODS.contains(&parts.method.as_str())
        || WEBDAV_HEADERS
            .iter()
            .any(|header| parts.headers.contains_key(*header))
        || WEBDAV_PATH_PREFIXES
            .iter()
            .any(|prefix| is_path_prefix(parts.uri.path(), prefix))
}

fn is_path_prefix(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Renders the 401 body for a rejected request.
///
/// WebDAV clients receive an XML fault, any other client a plain-text body.
pub fn translate_failure(parts: &Parts) -> Response<ResponseBody> {
    if is_webdav_request(parts) {
        fault_response(ProtocolFault::authentication_error().to_xml())
    } else {
        plain_unauthorized()
    }
}

pub fn plain_unauthorized() -> Response<ResponseBody> {
    unauthorized(b"Unauthorized".to_vec(), TEXT_CONTENT_TYPE)
}

fn fault_response(rendered: Result<String, quick_xml::Error>) -> Response<ResponseBody> {
    match rendered {
        Ok(xml) => unauthorized(xml.into_bytes(), XML_CONTENT_TYPE),
        Err(error) => {
            error!("Failed to render WebDAV fault: {error}");
            plain_unauthorized()
        }
    }
}

fn unauthorized(body: Vec<u8>, content_type: &'static str) -> Response<ResponseBody> {
    let mut response = Response::new(ResponseBody::fixed(body));
    *response.status_mut() = StatusCode::UNAUTHORIZED;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}
