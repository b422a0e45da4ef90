#![deny(unused_must_use)]
#![warn(clippy::dbg_macro, clippy::todo, clippy::unimplemented)]
#![forbid(unsafe_code)]

mod error;
mod resolver;


pub use error::ResolveError;
pub use resolver::{resolve, Locals, Resolution, Resolver};
