use std::error::Error;
use std::fmt;

/// Failures collected from independent units of work, each tagged with the
/// unit it came from (a module link, a file name).
#[derive(Debug)]
pub struct MultiError<E> {
    errors: Vec<(String, E)>,
}

impl<E> MultiError<E> {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn push(&mut self, source: impl Into<String>, error: E) {
        self.errors.push((source.into(), error));
    }

    pub fn errors(&self) -> &[(String, E)] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// `Ok(())` when nothing was collected, otherwise the collection itself.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl<E> Default for MultiError<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Into<String>, E> FromIterator<(S, E)> for MultiError<E> {
    fn from_iter<I: IntoIterator<Item = (S, E)>>(iter: I) -> Self {
        Self {
            errors: iter.into_iter().map(|(s, e)| (s.into(), e)).collect(),
        }
    }
}

impl<E: fmt::Display> fmt::Display for MultiError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Multiple errors occurred ({}): ", self.errors.len())?;
        for (i, (source, error)) in self.errors.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", source, error)?;
        }
        Ok(())
    }
}

impl<E: Error + 'static> Error for MultiError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.errors.first().map(|(_, e)| e as &dyn Error)
    }
}
