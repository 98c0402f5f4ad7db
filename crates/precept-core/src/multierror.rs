//! Aggregated multi-cause errors.
//!
//! Used at bootstrap time, where reporting every broken template or
//! constraint at once is more useful than failing on the first. Causes
//! render in insertion order.

use std::fmt;

/// An ordered collection of errors reported as one error value.
#[derive(Debug, Default)]
pub struct Errors {
    errs: Vec<anyhow::Error>,
}

impl Errors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one cause. Insertion order is preserved in the rendering.
    pub fn add(&mut self, err: impl Into<anyhow::Error>) {
        self.errs.push(err.into());
    }

    pub fn is_empty(&self) -> bool {
        self.errs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errs.len()
    }

    pub fn causes(&self) -> impl Iterator<Item = &anyhow::Error> {
        self.errs.iter()
    }

    /// `Ok(())` when no cause was recorded, otherwise `Err(self)`.
    pub fn into_result(self) -> Result<(), Errors> {
        if self.errs.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for Errors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errs.len() == 1 {
            return write!(f, "{:#}", self.errs[0]);
        }
        write!(f, "{} errors occurred:", self.errs.len())?;
        for err in &self.errs {
            write!(f, "\n  * {err:#}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Errors {}
