//! Pipeline stages for receipt processing.
//!
//! Each submodule implements exactly one transformation step. Keeping
//! stages separate makes each independently testable and lets us swap
//! implementations (e.g. a remote object store instead of the local
//! filesystem) without touching other stages.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ normalize ──▶ extract ──▶ (rotate? ──▶ extract) ──▶ store
//! (path/URL) (JPEG, upright) (VLM)      one retry max           (fs + URL)
//! ```
//!
//! 1. [`input`]     — CLI-side resolution of a path or URL to raw bytes
//! 2. [`normalize`] — decode, HEIC conversion, orientation heuristic,
//!    bounded resize, JPEG encode; CPU-bound, callers use `spawn_blocking`
//! 3. [`extract`]   — the polymorphic field-extraction capability; the only
//!    stage with network I/O
//! 4. [`store`]     — content-derived filename + filesystem write
//!
//! The conditional rotate-and-re-extract step is orchestrated by
//! [`crate::process`], not by any stage here.

pub mod extract;
pub mod input;
pub mod normalize;
pub mod store;
