// redactkit-context/src/lib.rs
#![cfg_attr(not(test), no_std)]

extern crate alloc;

#[cfg(all(feature = "std", not(test)))]
extern crate std;

pub mod context;
pub mod window;

pub use context::{ContextFlags, ContextScanner, KeywordCategory};
pub use window::{clamp_to_char_boundary, context_window, preceding_text};
