//! EDN codec for the socket REPL wire protocol.
//!
//! The crate owns the structured textual notation exchanged on both REPL
//! sockets: an incremental, restartable [`reader`] that tolerates partial
//! input from a streaming source, and a canonical [`writer`] whose output
//! reads back structurally equal. [`Value`] is the universal data type;
//! [`Symbol`] and [`Keyword`] are value types with structural equality so
//! they work as ordinary map keys.

mod reader;
mod value;
mod writer;

pub use reader::{ReadError, Reader, read_all, read_partial, read_str};
pub use value::{Keyword, Map, Ratio, Set, Symbol, Tagged, Value};
pub use writer::{write, write_to};
