//! 🔌 Backends: where bytes come from and where they go.
//!
//! One faucet (`source`: a file or stdin), one drain (`elasticsearch`), and an
//! in-memory drain so tests don't need a cluster in the room.

pub(crate) mod elasticsearch;
#[cfg(test)]
pub(crate) mod in_mem;
pub(crate) mod sink;
pub(crate) mod source;

pub(crate) use sink::Sink;
