#![deny(missing_docs)]

//! Minimal synchronous reactive data binding.
//!
//! This crate instruments plain data stores so that writes to individual
//! fields drive change-gated callbacks, with dependencies discovered by
//! observing what each callback's value expression actually reads. There is
//! no scheduler and no batching: a write returns only after every affected
//! callback has run.
//!
//! # Quick Start
//!
//! ```ignore
//! use rebind::{Computation, Observable, Observe, observe};
//!
//! struct Profile {
//!     name: Observable<String>,
//!     age: Observable<i64>,
//! }
//!
//! impl Observe for Profile {
//!     fn observe(&self) {
//!         self.name.observe();
//!         self.age.observe();
//!     }
//! }
//!
//! let profile = Arc::new(Profile {
//!     name: Observable::new("Ann".to_string()),
//!     age: Observable::new(30),
//! });
//! observe(&*profile); // Instrument every field, recursively
//!
//! // Dependencies are discovered from the reads the expression performs
//! let source = profile.clone();
//! let greeting = Computation::new(
//!     move || format!("hello {}", source.name.get()),
//!     |new, old| println!("{old} -> {new}"),
//! );
//!
//! profile.name.set("Bob".to_string())?; // Runs the callback before returning
//! profile.age.set(31)?;                 // Not a dependency, nothing runs
//! ```
//!
//! # Core Types
//!
//! - [`Observable<T>`] - One reactive field. Inert until an [`observe`] walk
//!   attaches its change channel.
//! - [`Observe`] - The instrumentation walk. Containers forward to their
//!   fields; plain values are no-ops.
//! - [`Computation<T>`] - Change-gated reader. Re-evaluates on writes to its
//!   dependencies and calls back with `(new, old)` when the result differs.
//! - [`BindingError`] - Rejected writes: mutation during a field's own
//!   notification pass, or fan-out reaching a computation mid-evaluation.
//!
//! # Observable
//!
//! ```ignore
//! let field = Observable::new(5);
//! field.get();          // Subscribes the evaluating computation, if any
//! field.with(|v| ...);  // Borrowing read, same subscription rule
//! field.set(6)?;        // Store, then notify observers in order
//! field.replace(7)?;    // Store, returning the previous value
//! field.update(|v| *v += 1)?;
//! ```
//!
//! # Computation
//!
//! ```ignore
//! // Seed evaluation runs immediately and subscribes to every field it reads
//! let label = Computation::new(
//!     move || store.name.get(),
//!     |new, old| println!("{old} -> {new}"),
//! );
//!
//! label.value();    // Cached result; never re-evaluates
//! label.dispose();  // Detach from every channel
//! ```
//!
//! # Untracked reads
//!
//! ```ignore
//! // Inside an expression: read without subscribing
//! let peeked = untracked(|| config.flag.get());
//! ```

// Internal modules
pub(crate) mod arena;
mod channel;
mod computation;
mod error;
mod hash;
mod observable;
mod store;
mod tracker;

// Core types
pub use computation::Computation;
pub use error::BindingError;
pub use observable::Observable;

// Instrumentation walk
pub use store::{Observe, observe};

// Key functions
pub use tracker::untracked;
