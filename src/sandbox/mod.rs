//! Sandbox root and path confinement
//!
//! Every filesystem or process operation the agent performs goes through a
//! [`SandboxRoot`]. The root is canonicalized once when the agent starts and
//! every path the model supplies is resolved against it by [`guard`] before
//! any I/O happens.
//!
//! ```text
//! model path ──► SandboxRoot::resolve ──► lexical normalize
//!                                            │
//!                                            ▼
//!                              canonicalize longest existing prefix
//!                                            │
//!                          under root? ──────┴────── no ──► ResolveError::Escape
//!                              │
//!                              ▼
//!                        absolute path used for I/O
//! ```

pub mod guard;

pub use guard::{is_within, EscapeError, ResolveError, SandboxRoot};
