use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::Method;
use serde_json::Value;

/// Payload of an outbound request. Kept as plain data so the request can be
/// rebuilt for its one retry.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    /// multipart/form-data parts; repeated names are sent repeatedly
    Form(Vec<FormPart>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        content_type: String,
        bytes: Vec<u8>,
    },
}

impl FormPart {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        FormPart::Text {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            FormPart::Text { name, .. } | FormPart::File { name, .. } => name,
        }
    }
}

/// An outbound call to the backend: method, path relative to the API base,
/// headers, body and the single-use retried marker.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: RequestBody,
    retried: bool,
}

impl RequestDescriptor {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn form(mut self, parts: Vec<FormPart>) -> Self {
        self.body = RequestBody::Form(parts);
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn is_retried(&self) -> bool {
        self.retried
    }

    pub(crate) fn mark_retried(&mut self) {
        self.retried = true;
    }

    /// Set `Authorization: Bearer <token>`. Returns false (and leaves the
    /// headers untouched) if the token cannot be a header value.
    pub fn set_bearer(&mut self, token: &str) -> bool {
        match HeaderValue::from_str(&format!("Bearer {}", token)) {
            Ok(mut value) => {
                value.set_sensitive(true);
                self.headers.insert(AUTHORIZATION, value);
                true
            }
            Err(_) => false,
        }
    }

    /// Drop any `Authorization` header, e.g. one left over from an earlier send
    pub fn clear_bearer(&mut self) {
        self.headers.remove(AUTHORIZATION);
    }

    /// The bearer token currently attached, if any
    pub fn bearer_token(&self) -> Option<&str> {
        self.headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bearer_round_trip() {
        let mut request = RequestDescriptor::get("/core/profile/");
        assert_eq!(request.bearer_token(), None);

        assert!(request.set_bearer("A1"));
        assert_eq!(request.bearer_token(), Some("A1"));
        assert!(request.headers[AUTHORIZATION].is_sensitive());

        assert!(request.set_bearer("A2"));
        assert_eq!(request.bearer_token(), Some("A2"));
        assert_eq!(request.headers.get_all(AUTHORIZATION).iter().count(), 1);
    }

    #[test]
    fn test_bearer_rejects_header_breaking_token() {
        let mut request = RequestDescriptor::get("/core/profile/");
        assert!(!request.set_bearer("bad\ntoken"));
        assert!(request.headers.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn test_clear_bearer_removes_stale_header() {
        let mut request = RequestDescriptor::get("/core/profile/");
        assert!(request.set_bearer("A1"));

        request.clear_bearer();
        assert_eq!(request.bearer_token(), None);
        assert!(request.headers.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn test_form_part_names() {
        let parts = vec![
            FormPart::text("bio", "hi"),
            FormPart::File {
                name: "profile_image".into(),
                file_name: "me.png".into(),
                content_type: "image/png".into(),
                bytes: vec![1, 2, 3],
            },
        ];
        let names: Vec<&str> = parts.iter().map(FormPart::name).collect();
        assert_eq!(names, vec!["bio", "profile_image"]);
    }

    #[test]
    fn test_new_request_is_not_retried() {
        let mut request = RequestDescriptor::post("/ai/recommend/").json(json!({"responses": []}));
        assert!(!request.is_retried());
        request.mark_retried();
        assert!(request.is_retried());
        assert_eq!(request.body, RequestBody::Json(json!({"responses": []})));
    }
}
