//! Form payloads for POST requests.

use bytes::Bytes;

/// Content type used for encoded form bodies.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// An ordered set of form fields sent as the body of a POST request.
///
/// Fields keep their insertion order and repeated names are allowed, matching
/// what HTML forms submit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FormData {
    fields: Vec<(String, String)>,
}

impl FormData {
    /// Create an empty form.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field to the form.
    pub fn field(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.add_field(name, value);
        self
    }

    /// Add a field to the form in place.
    pub fn add_field(&mut self, name: impl Into<String>, value: impl ToString) {
        self.fields.push((name.into(), value.to_string()));
    }

    /// The fields in insertion order.
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// Whether the form has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Encode the form as `application/x-www-form-urlencoded`.
    pub fn encode(&self) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (name, value) in &self.fields {
            serializer.append_pair(name, value);
        }
        serializer.finish()
    }

    /// Encode the form into a request body.
    pub fn to_body(&self) -> Bytes {
        Bytes::from(self.encode())
    }

    /// The content type of the encoded body.
    pub fn content_type(&self) -> &'static str {
        FORM_CONTENT_TYPE
    }
}

impl<K, V> FromIterator<(K, V)> for FormData
where
    K: Into<String>,
    V: ToString,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut form = Self::new();
        for (name, value) in iter {
            form.add_field(name, value);
        }
        form
    }
}
