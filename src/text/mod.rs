//! The namespaced `.gsn` text form.
//!
//! One block per namespace; nodes nest by containment, references appear as
//! trailing `ref_<type>: a.b.c;` statements at the referrer's level:
//!
//! ```text
//! GOALS nsp
//! {
//!     goal G1
//!     {
//!         uuid:"...";
//!         summary:'''...''';
//!         label:safety;
//!         strategy S1
//!         {
//!             uuid:"...";
//!             ref_goal: nsp.G2;
//!         }
//!     }
//! }
//! ```
//!
//! Triple-quoted text is written verbatim; text containing `'''` does not
//! survive a round trip.

pub mod parse;
pub mod write;

pub use parse::{ParseError, from_text, parse_text};
pub use write::{Namespace, TextNode, model_to_text, populate_namespaces, to_single_file, to_text};

pub const FILE_EXTENSION: &str = "gsn";

/// File name used when every namespace goes into one file.
pub const SINGLE_FILE_NAME: &str = "main.gsn";

/// Prefix of reference statements (`ref_goal`, `ref_context`, ...).
pub const REF_PREFIX: &str = "ref_";
