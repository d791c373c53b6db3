#![forbid(unsafe_code)]

//! Inbound HTTP requests as seen by a binding.

use http::Method;
use std::collections::HashMap;

/// The parts of an HTTP request a binding looks at: the method and the
/// decoded form fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingRequest {
    method: Method,
    form: HashMap<String, String>,
}

impl BindingRequest {
    /// Build from already decoded form fields. A repeated field keeps its
    /// first value.
    pub fn new<I, K, V>(method: Method, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut form = HashMap::new();
        for (k, v) in fields {
            form.entry(k.into()).or_insert_with(|| v.into());
        }
        Self { method, form }
    }

    /// A POST carrying `fields`.
    pub fn post<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::new(Method::POST, fields)
    }

    /// Build from an `application/x-www-form-urlencoded` body.
    pub fn from_urlencoded(method: Method, body: &[u8]) -> Self {
        Self::new(method, form_urlencoded::parse(body).into_owned())
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// A form field by its case-sensitive name.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.form.get(name).map(String::as_str)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.form.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urlencoded_body() {
        let req = BindingRequest::from_urlencoded(
            Method::POST,
            b"SAMLResponse=PGEvPg%3D%3D&RelayState=a+b%26c&RelayState=second",
        );
        assert_eq!(req.field("SAMLResponse"), Some("PGEvPg=="));
        assert_eq!(req.field("RelayState"), Some("a b&c"));
        assert!(!req.has_field("samlresponse"));
    }
}
