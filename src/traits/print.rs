//! # **Print Module** - *Display helpers*
//!
//! Contains the `Print` trait, which wraps `Display` to provide
//! `myobj.print()` for any object that implements it, plus the preview
//! length shared by the crate's `Display` impls.

use std::fmt::Display;

pub(crate) const MAX_PREVIEW: usize = 50;

/// # Print
///
/// Convenience wrapper over `Display`: `arr.print()` instead of
/// `println!("{}", arr);`.
pub trait Print {
    #[inline]
    fn print(&self)
    where
        Self: Display,
    {
        println!("{}", self);
    }
}

impl<T: Display> Print for T {}
