//! In-memory representation of EDN data.
//!
//! [`Value`] is the universal type exchanged on both REPL sockets. Symbols
//! and keywords are value types with structural equality and hash over
//! `(namespace, name)`, so they can be used directly as ordinary map keys.
//! Maps and sets preserve insertion order to keep re-serialised protocol
//! messages deterministic.

use std::fmt;

use crate::writer;

/// An EDN symbol, optionally namespace-qualified.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol {
    /// Namespace part, when qualified (`clojure.core` in `clojure.core/inc`).
    pub namespace: Option<String>,
    /// Name part (`inc` in `clojure.core/inc`).
    pub name: String,
}

impl Symbol {
    /// Creates an unqualified symbol.
    #[must_use]
    pub fn plain(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
        }
    }

    /// Creates a namespace-qualified symbol.
    #[must_use]
    pub fn qualified(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }

    /// Parses `ns/name` notation. A bare `/` is the division symbol, not a
    /// separator.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        match split_qualified(text) {
            Some((namespace, name)) => Self::qualified(namespace, name),
            None => Self::plain(text),
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(namespace) = &self.namespace {
            write!(formatter, "{namespace}/{}", self.name)
        } else {
            formatter.write_str(&self.name)
        }
    }
}

/// An EDN keyword, optionally namespace-qualified.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Keyword {
    /// Namespace part (`shadow` in `:shadow/build-ids`).
    pub namespace: Option<String>,
    /// Name part, without the leading colon.
    pub name: String,
}

impl Keyword {
    /// Creates an unqualified keyword.
    #[must_use]
    pub fn plain(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
        }
    }

    /// Creates a namespace-qualified keyword.
    #[must_use]
    pub fn qualified(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }

    /// Parses `ns/name` notation, without the leading colon.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        match split_qualified(text) {
            Some((namespace, name)) => Self::qualified(namespace, name),
            None => Self::plain(text),
        }
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(namespace) = &self.namespace {
            write!(formatter, ":{namespace}/{}", self.name)
        } else {
            write!(formatter, ":{}", self.name)
        }
    }
}

fn split_qualified(text: &str) -> Option<(&str, &str)> {
    if text == "/" {
        return None;
    }
    text.split_once('/')
        .filter(|(namespace, name)| !namespace.is_empty() && !name.is_empty())
}

/// A rational number literal such as `1/3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ratio {
    /// Numerator, carrying the sign.
    pub numerator: i64,
    /// Denominator, always positive in canonical form.
    pub denominator: i64,
}

impl fmt::Display for Ratio {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}/{}", self.numerator, self.denominator)
    }
}

/// A tagged literal such as `#inst "2024-01-01"`.
///
/// Unknown tags are preserved rather than rejected, so values produced by a
/// remote with richer reader extensions still round-trip.
#[derive(Debug, Clone, PartialEq)]
pub struct Tagged {
    /// The reader tag, e.g. `inst`.
    pub tag: Symbol,
    /// The form following the tag.
    pub value: Box<Value>,
}

/// Tagged union over every representable EDN form.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// `nil`.
    #[default]
    Nil,
    /// `true` or `false`.
    Bool(bool),
    /// An integer literal.
    Int(i64),
    /// A floating-point literal, including `##Inf`, `##-Inf` and `##NaN`.
    Float(f64),
    /// A ratio literal such as `22/7`.
    Ratio(Ratio),
    /// A character literal such as `\a` or `\newline`.
    Char(char),
    /// A string literal.
    String(String),
    /// A symbol.
    Symbol(Symbol),
    /// A keyword.
    Keyword(Keyword),
    /// An ordered list `(...)`.
    List(Vec<Value>),
    /// An ordered, indexable vector `[...]`.
    Vector(Vec<Value>),
    /// A map `{...}` with unique keys and stable insertion order.
    Map(Map),
    /// A set `#{...}` with unique members and stable insertion order.
    Set(Set),
    /// A tagged literal `#tag form`.
    Tagged(Tagged),
}

impl Value {
    /// Shorthand for an unqualified keyword value.
    #[must_use]
    pub fn keyword(name: &str) -> Self {
        Self::Keyword(Keyword::plain(name))
    }

    /// Shorthand for an unqualified symbol value.
    #[must_use]
    pub fn symbol(name: &str) -> Self {
        Self::Symbol(Symbol::plain(name))
    }

    /// Shorthand for a string value.
    #[must_use]
    pub fn string(text: impl Into<String>) -> Self {
        Self::String(text.into())
    }

    /// Returns the string content when the value is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(text) => Some(text),
            _ => None,
        }
    }

    /// Returns the integer content when the value is an integer.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(number) => Some(*number),
            _ => None,
        }
    }

    /// Returns the keyword when the value is a keyword.
    #[must_use]
    pub fn as_keyword(&self) -> Option<&Keyword> {
        match self {
            Self::Keyword(keyword) => Some(keyword),
            _ => None,
        }
    }

    /// Returns the symbol when the value is a symbol.
    #[must_use]
    pub fn as_symbol(&self) -> Option<&Symbol> {
        match self {
            Self::Symbol(symbol) => Some(symbol),
            _ => None,
        }
    }

    /// Returns the map when the value is a map.
    #[must_use]
    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Returns the elements when the value is a list or a vector.
    #[must_use]
    pub fn as_seq(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) | Self::Vector(items) => Some(items),
            _ => None,
        }
    }

    /// True for `nil` and `false`, mirroring Clojure truthiness.
    #[must_use]
    pub fn is_falsey(&self) -> bool {
        matches!(self, Self::Nil | Self::Bool(false))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&writer::write(self))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Keyword> for Value {
    fn from(value: Keyword) -> Self {
        Self::Keyword(value)
    }
}

impl From<Symbol> for Value {
    fn from(value: Symbol) -> Self {
        Self::Symbol(value)
    }
}

impl From<Map> for Value {
    fn from(value: Map) -> Self {
        Self::Map(value)
    }
}

/// An insertion-ordered map with keys unique by structural equality.
///
/// Protocol messages are small, so lookup is a linear scan; determinism of
/// the re-serialised entry order matters more than lookup complexity here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Map {
    entries: Vec<(Value, Value)>,
}

impl Map {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an entry, replacing the value in place when the key already
    /// exists. Returns the previous value, if any.
    pub fn insert(&mut self, key: Value, value: Value) -> Option<Value> {
        for (existing, slot) in &mut self.entries {
            if *existing == key {
                return Some(std::mem::replace(slot, value));
            }
        }
        self.entries.push((key, value));
        None
    }

    /// Looks up a value by structural key equality.
    #[must_use]
    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    /// Looks up the value stored under an unqualified keyword key.
    #[must_use]
    pub fn get_keyword(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(key, _)| {
                matches!(key, Value::Keyword(keyword)
                    if keyword.namespace.is_none() && keyword.name == name)
            })
            .map(|(_, value)| value)
    }

    /// True when the map contains the key.
    #[must_use]
    pub fn contains_key(&self, key: &Value) -> bool {
        self.get(key).is_some()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the map has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &(Value, Value)> {
        self.entries.iter()
    }
}

impl FromIterator<(Value, Value)> for Map {
    fn from_iter<I: IntoIterator<Item = (Value, Value)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

impl IntoIterator for Map {
    type Item = (Value, Value);
    type IntoIter = std::vec::IntoIter<(Value, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// An insertion-ordered set with members unique by structural equality.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Set {
    members: Vec<Value>,
}

impl Set {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a member, keeping the first occurrence. Returns false when
    /// the member was already present.
    pub fn insert(&mut self, member: Value) -> bool {
        if self.members.contains(&member) {
            return false;
        }
        self.members.push(member);
        true
    }

    /// True when the set contains the member.
    #[must_use]
    pub fn contains(&self, member: &Value) -> bool {
        self.members.contains(member)
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// True when the set has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Iterates members in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.members.iter()
    }
}

impl FromIterator<Value> for Set {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        let mut set = Self::new();
        for member in iter {
            set.insert(member);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn symbols_compare_by_namespace_and_name() {
        assert_eq!(Symbol::parse("clojure.core/inc"), Symbol::qualified("clojure.core", "inc"));
        assert_eq!(Symbol::parse("/"), Symbol::plain("/"));
        assert_ne!(Symbol::plain("inc"), Symbol::qualified("clojure.core", "inc"));
    }

    #[rstest]
    fn keywords_display_with_leading_colon() {
        assert_eq!(Keyword::plain("op").to_string(), ":op");
        assert_eq!(Keyword::qualified("shadow", "build-ids").to_string(), ":shadow/build-ids");
    }

    #[rstest]
    fn map_replaces_values_in_place() {
        let mut map = Map::new();
        map.insert(Value::keyword("a"), Value::Int(1));
        map.insert(Value::keyword("b"), Value::Int(2));
        let previous = map.insert(Value::keyword("a"), Value::Int(3));

        assert_eq!(previous, Some(Value::Int(1)));
        assert_eq!(map.len(), 2);

        let keys: Vec<_> = map.iter().map(|(key, _)| key.clone()).collect();
        assert_eq!(keys, vec![Value::keyword("a"), Value::keyword("b")]);
        assert_eq!(map.get_keyword("a"), Some(&Value::Int(3)));
    }

    #[rstest]
    fn map_keys_use_structural_equality() {
        let mut map = Map::new();
        map.insert(
            Value::Vector(vec![Value::Int(1), Value::Int(2)]),
            Value::keyword("first"),
        );
        map.insert(
            Value::Vector(vec![Value::Int(1), Value::Int(2)]),
            Value::keyword("second"),
        );

        assert_eq!(map.len(), 1);
        assert_eq!(
            map.get(&Value::Vector(vec![Value::Int(1), Value::Int(2)])),
            Some(&Value::keyword("second"))
        );
    }

    #[rstest]
    fn set_keeps_first_occurrence() {
        let mut set = Set::new();
        assert!(set.insert(Value::Int(1)));
        assert!(set.insert(Value::Int(2)));
        assert!(!set.insert(Value::Int(1)));
        assert_eq!(set.len(), 2);
    }
}
