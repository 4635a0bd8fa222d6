//! PEARL: persona-grounded chat for user research.
//!
//! A researcher describes a persona in free text, then interviews a
//! language model that answers in character. The conversation can be
//! exported as a plain-text interview transcript.
//!
//! See `DESIGN.md` for the module layout.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod conversation;
pub mod logging;
pub mod prompt;
pub mod providers;
pub mod repl;
pub mod session;
pub mod transcript;
