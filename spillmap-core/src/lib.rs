//! A library of composable, mutable key/value mappings.
//!
//! The two load-bearing pieces are [`lru::Lru`], a weighted
//! least-recently-used cache with a heavy-key fast path, and
//! [`buffer::Buffer`], a two-tier spill engine built on top of it. Both
//! implement [`mapping::Mapping`] (and its eviction-aware extension,
//! [`mapping::Evicting`]), so they compose: a `Buffer` is, at its core,
//! an `Lru` wired with callbacks into a second `Mapping`.
//!
//! ```
//! use spillmap_core::buffer::Buffer;
//! use spillmap_core::mapping::{Mapping, MemoryLeaf};
//!
//! let buf = Buffer::new(MemoryLeaf::new(), MemoryLeaf::new(), 2.0).unwrap();
//! buf.put("a", 1).unwrap();
//! buf.put("b", 2).unwrap();
//! buf.put("c", 3).unwrap(); // "a" is demoted to the slow tier
//! assert_eq!(buf.get(&"a").unwrap(), 1); // restored back to the fast tier
//! ```
//!
//! What this crate deliberately does not do: provide a wire protocol, a
//! CLI, or concrete on-disk/LMDB/shared-memory backends. Those are left
//! to whatever leaf `Mapping` a caller plugs in underneath an `Lru` or
//! `Buffer`.

pub mod accumulator;
pub mod buffer;
pub mod error;
pub mod lru;
pub mod mapping;
pub mod ordered_set;

pub use accumulator::Accumulator;
pub use buffer::Buffer;
pub use error::{Error, Result};
pub use lru::Lru;
pub use mapping::{Evicting, Mapping, MemoryLeaf};
pub use ordered_set::InsertionOrderedSet;
