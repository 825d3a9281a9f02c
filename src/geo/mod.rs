//! Geography: request keys, state lookup, and endpoint dispatch.

pub mod dispatch;
pub mod spec;
pub mod states;
