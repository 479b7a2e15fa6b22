use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Emission failure.
///
/// Template problems are fatal: the tool either emits clean C or reports
/// one of these and exits.
#[derive(Debug, Error)]
pub enum EmitError {
    /// Template file could not be read.
    #[error("failed to read template `{path}`: {source}")]
    TemplateIo {
        /// Path the loader attempted.
        path: PathBuf,
        /// Underlying I/O failure.
        source: io::Error,
    },

    /// The same hole name occurs on more than one line.
    #[error("template `{template}` contains hole `{hole}` more than once")]
    DuplicateHole {
        /// Template name.
        template: String,
        /// Offending hole.
        hole: String,
    },

    /// A template with no `$$NAME$$` lines is a packaging mistake.
    #[error("template `{template}` contains no holes")]
    NoHoles {
        /// Template name.
        template: String,
    },

    /// A substitution was provided for a hole the template does not define.
    #[error("template `{template}` has no hole `{hole}` (defined: {defined})")]
    UnknownHole {
        /// Template name.
        template: String,
        /// Offending hole.
        hole: String,
        /// Holes the template does define.
        defined: String,
    },

    /// Render finished with holes still unplugged.
    #[error("template `{template}`: holes not plugged: {holes}")]
    UnfilledHoles {
        /// Template name.
        template: String,
        /// The missing holes.
        holes: String,
    },
}
