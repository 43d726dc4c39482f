use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use hyper::header::{AsHeaderName, AUTHORIZATION, HOST, USER_AGENT};
use hyper::http::request::Parts;

static BEARER_PREFIX: &str = "Bearer ";
static BASIC_PREFIX: &str = "Basic ";

pub trait HeaderExt {
    fn get_header<K: AsHeaderName>(&self, header: K) -> Option<String>;
    fn bearer_token(&self) -> Option<String>;
    fn basic_auth(&self) -> Option<(String, String)>;
    fn user_agent(&self) -> String;
    fn realm(&self) -> String;
    fn request_uri(&self) -> String;
    fn query_param(&self, name: &str) -> Option<String>;
}

impl HeaderExt for Parts {
    fn get_header<K>(&self, header: K) -> Option<String>
    where
        K: AsHeaderName,
    {
        self.headers
            .get(header)
            .and_then(|header| header.to_str().ok())
            .map(ToString::to_string)
    }

    fn bearer_token(&self) -> Option<String> {
        let authorization = self.get_header(AUTHORIZATION)?;
        authorization
            .strip_prefix(BEARER_PREFIX)
            .map(std::string::ToString::to_string)
    }

    fn basic_auth(&self) -> Option<(String, String)> {
        let authorization = self.get_header(AUTHORIZATION)?;

        let value = authorization.strip_prefix(BASIC_PREFIX)?;
        let value = BASE64_STANDARD.decode(value).ok()?;
        let value = String::from_utf8(value).ok()?;

        let (username, password) = value.split_once(':')?;
        Some((username.to_string(), password.to_string()))
    }

    fn user_agent(&self) -> String {
        self.get_header(USER_AGENT).unwrap_or_default()
    }

    // Host header first, then the authority of an absolute-form target
    fn realm(&self) -> String {
        self.get_header(HOST)
            .or_else(|| self.uri.authority().map(ToString::to_string))
            .unwrap_or_default()
    }

    fn request_uri(&self) -> String {
        self.uri
            .path_and_query()
            .map_or_else(|| self.uri.path().to_string(), ToString::to_string)
    }

    fn query_param(&self, name: &str) -> Option<String> {
        let query = self.uri.query()?;
        let params: Vec<(String, String)> = serde_urlencoded::from_str(query).ok()?;

        params
            .into_iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }
}
