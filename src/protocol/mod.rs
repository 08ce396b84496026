//! Protocol Module
//!
//! Defines the wire protocol for client-server communication.
//!
//! ## Protocol Format
//!
//! Every request and response is one length-prefixed frame:
//! ```text
//! ┌──────────┬─────────────────────────────┐
//! │ Len (4)  │   UTF-8 text (Len bytes)    │
//! └──────────┴─────────────────────────────┘
//! ```
//!
//! ### Commands
//! - `GET key`
//! - `SET key value`
//! - `DEL key`
//! - `BEGIN` / `COMMIT` / `ROLLBACK`
//!
//! ### Responses
//! - a value, `OK`, `NIL` or `ERROR(<reason>)`

mod codec;
mod command;
mod response;

pub use codec::{encode_frame, read_frame, write_frame, HEADER_SIZE};
pub use command::{Command, CommandType};
pub use response::Response;
