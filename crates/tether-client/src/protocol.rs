//! Wire message types shared by both streams.

use std::sync::atomic::{AtomicI64, Ordering};

use tether_edn::{Keyword, Map, Value};

/// Thread-safe request id source.
///
/// Ids are unique and monotonically increasing over a client's lifetime,
/// which is what lets the correlation engine match responses to callers.
#[derive(Debug)]
pub(crate) struct IdGenerator(AtomicI64);

impl IdGenerator {
    pub(crate) fn new() -> Self {
        Self(AtomicI64::new(1))
    }

    /// Issues the next id.
    pub(crate) fn next(&self) -> i64 {
        self.0.fetch_add(1, Ordering::SeqCst)
    }
}

/// An inbound message from either stream.
///
/// Responses are maps carrying an `:id` when they answer a correlated
/// request, and a `:tag` discriminator (`:out`, `:err`, `:ret`, `:in`) when
/// they are evaluation output frames.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    map: Map,
}

impl Response {
    /// The underlying map.
    #[must_use]
    pub fn map(&self) -> &Map {
        &self.map
    }

    /// Consumes the response, yielding the underlying map.
    #[must_use]
    pub fn into_map(self) -> Map {
        self.map
    }

    /// The correlation id, when present.
    #[must_use]
    pub fn id(&self) -> Option<i64> {
        self.map.get_keyword("id").and_then(Value::as_int)
    }

    /// The `:tag` discriminator, when present.
    #[must_use]
    pub fn tag(&self) -> Option<&Keyword> {
        self.map.get_keyword("tag").and_then(Value::as_keyword)
    }

    /// The `:tag` discriminator name, when present and unqualified.
    #[must_use]
    pub fn tag_name(&self) -> Option<&str> {
        self.tag()
            .filter(|keyword| keyword.namespace.is_none())
            .map(|keyword| keyword.name.as_str())
    }

    /// The `:val` field, when present and a string.
    #[must_use]
    pub fn val(&self) -> Option<&str> {
        self.map.get_keyword("val").and_then(Value::as_str)
    }

    /// Looks up a field stored under an unqualified keyword.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.map.get_keyword(name)
    }

    /// Looks up a field stored under a namespace-qualified keyword.
    #[must_use]
    pub fn get_qualified(&self, namespace: &str, name: &str) -> Option<&Value> {
        self.map
            .get(&Value::Keyword(Keyword::qualified(namespace, name)))
    }
}

impl From<Map> for Response {
    fn from(map: Map) -> Self {
        Self { map }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use tether_edn::read_str;

    use super::*;

    fn response(text: &str) -> Response {
        let value = read_str(text).expect("parse failed");
        let map = value.as_map().expect("expected a map").clone();
        Response::from(map)
    }

    #[rstest]
    fn exposes_id_tag_and_val() {
        let response = response(r#"{:id 7, :tag :ret, :val "2"}"#);
        assert_eq!(response.id(), Some(7));
        assert_eq!(response.tag_name(), Some("ret"));
        assert_eq!(response.val(), Some("2"));
    }

    #[rstest]
    fn resolves_qualified_fields() {
        let response = response("{:shadow/build-ids [:app :test]}");
        let ids = response
            .get_qualified("shadow", "build-ids")
            .and_then(Value::as_seq)
            .expect("expected a sequence");
        assert_eq!(ids.len(), 2);
    }

    #[rstest]
    fn ids_are_issue_order_monotonic() {
        let ids = IdGenerator::new();
        let first = ids.next();
        let second = ids.next();
        assert!(second > first);
    }
}
