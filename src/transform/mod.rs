//! Canonicalization transforms, one module per encoding family.
//!
//! Every transform is a pure `&str -> String` function; decoding transforms
//! append their variants after the working value, normalizing transforms
//! rewrite in place. Registration order lives in [`crate::pipeline`].

pub mod base64;
pub mod charcode;
pub mod concat;
pub mod entities;
pub mod js_unicode;
pub mod markup;
pub mod proprietary;
pub mod sql;
pub mod structural;
pub mod utf7;
