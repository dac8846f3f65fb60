//! Per-connection session state.

use tether_edn::Keyword;

/// The evaluation backend a form is targeted at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, strum::Display, strum::EnumString)]
pub enum Dialect {
    /// JVM-hosted Clojure.
    #[default]
    #[strum(serialize = "clj")]
    Clj,
    /// JavaScript-hosted ClojureScript.
    #[strum(serialize = "cljs")]
    Cljs,
}

impl Dialect {
    /// The keyword form used in wire requests, e.g. `:clj`.
    #[must_use]
    pub fn keyword(self) -> Keyword {
        Keyword::plain(self.to_string())
    }
}

/// Options negotiated after connecting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionOptions {
    /// The shadow-cljs build id chosen during ClojureScript support
    /// negotiation, consulted by later ClojureScript operations.
    pub shadow_build_id: Option<Keyword>,
}

/// Mutable state describing one client connection.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// Host of the primary socket REPL.
    pub host: String,
    /// Port of the primary socket REPL.
    pub port: u16,
    /// Backchannel address reported during the handshake.
    pub backchannel: Option<(String, u16)>,
    /// Namespace evaluations are attributed to.
    pub namespace: String,
    /// Current evaluation backend.
    pub dialect: Dialect,
    /// Negotiated options.
    pub options: SessionOptions,
}

impl Session {
    /// Creates the initial session for a connection attempt.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            backchannel: None,
            namespace: "user".to_owned(),
            dialect: Dialect::default(),
            options: SessionOptions::default(),
        }
    }
}
