//! Constructors for the backchannel op vocabulary.
//!
//! Each function builds the request map for one remote operation. Ids are
//! assigned by the correlation engine at send time when absent.

use tether_edn::{Map, Symbol, Value};

use crate::session::Dialect;

fn op(name: &str) -> Map {
    let mut map = Map::new();
    map.insert(Value::keyword("op"), Value::keyword(name));
    map
}

/// Uploads one runtime source file to the sub-REPL.
#[must_use]
pub fn load_base64(filename: &str, content: &str) -> Map {
    let mut map = op("load-base64");
    map.insert(Value::keyword("filename"), Value::string(filename));
    map.insert(Value::keyword("content"), Value::string(content));
    map
}

/// Points subsequent primary-stream evaluation at a namespace and source
/// position, so the remote attaches correct metadata to the plain-text
/// evaluation that follows.
#[must_use]
pub fn set_eval_context(id: i64, file: &str, namespace: &str, line: u32, column: u32) -> Map {
    let mut map = op("set-eval-context");
    map.insert(Value::keyword("id"), Value::Int(id));
    map.insert(Value::keyword("file"), Value::string(file));
    map.insert(
        Value::keyword("ns"),
        Value::Symbol(Symbol::parse(namespace)),
    );
    map.insert(Value::keyword("line"), Value::Int(i64::from(line)));
    map.insert(Value::keyword("column"), Value::Int(i64::from(column)));
    map
}

/// Requests completion candidates for a prefix.
#[must_use]
pub fn completions(prefix: &str, namespace: Option<&str>, dialect: Dialect) -> Map {
    let mut map = op("completions");
    map.insert(Value::keyword("prefix"), Value::string(prefix));
    map.insert(Value::keyword("ns"), namespace_field(namespace));
    map.insert(Value::keyword("dialect"), Value::Keyword(dialect.keyword()));
    map
}

/// Requests metadata for a named var or keyword.
#[must_use]
pub fn lookup(named: &str, namespace: Option<&str>, dialect: Dialect) -> Map {
    let mut map = op("lookup");
    map.insert(Value::keyword("named"), Value::string(named));
    map.insert(Value::keyword("ns"), namespace_field(namespace));
    map.insert(Value::keyword("dialect"), Value::Keyword(dialect.keyword()));
    map
}

/// Asks the remote to abort the in-flight evaluation. Cooperative: the
/// remote decides when, and whether, to comply.
#[must_use]
pub fn interrupt() -> Map {
    op("interrupt")
}

/// Negotiates ClojureScript support.
#[must_use]
pub fn initialize_cljs() -> Map {
    op("initialize-cljs")
}

/// Runs tests in a namespace, optionally narrowed to specific vars. The
/// remote streams one event response per assertion outcome and ends with a
/// `:ret`-tagged summary.
#[must_use]
pub fn run_tests(namespace: &str, vars: &[&str]) -> Map {
    let mut map = op("test");
    map.insert(
        Value::keyword("ns"),
        Value::Symbol(Symbol::parse(namespace)),
    );
    if !vars.is_empty() {
        let vars = vars
            .iter()
            .map(|var| Value::Symbol(Symbol::parse(var)))
            .collect();
        map.insert(Value::keyword("vars"), Value::Vector(vars));
    }
    map
}

fn namespace_field(namespace: Option<&str>) -> Value {
    match namespace {
        Some(name) => Value::Symbol(Symbol::parse(name)),
        None => Value::Nil,
    }
}
