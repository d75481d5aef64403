//! Formatting helpers.

use std::fmt;

/// Wrapper that forwards a value's `Display` impl to `Debug`, so hashes can
/// appear in `debug_struct` output in their conventional reversed-hex form.
pub(crate) struct DisplayToDebug<T>(pub T);

impl<T> fmt::Debug for DisplayToDebug<T>
where
    T: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
