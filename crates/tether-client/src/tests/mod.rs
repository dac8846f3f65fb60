//! Integration-style tests exercising the client against in-process mock
//! REPL servers.

mod client_behaviour;
mod support;
