//! Line ending helpers.
//!
//! Text is stored with LF (`'\n'`) only; carriage returns are dropped on load. The
//! terminator written on save is chosen per document.

/// The newline sequence used when saving a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineEnding {
    /// Unix-style LF (`'\n'`).
    #[default]
    Lf,
    /// Windows-style CRLF (`"\r\n"`).
    Crlf,
}

impl LineEnding {
    /// The terminator written for each internal `'\n'`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::Crlf => "\r\n",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminators() {
        assert_eq!(LineEnding::default(), LineEnding::Lf);
        assert_eq!(LineEnding::Lf.as_str(), "\n");
        assert_eq!(LineEnding::Crlf.as_str(), "\r\n");
    }
}
