//! Errors generated by the compiler.

use crate::{GPosIdx, Id, WithPos};

/// Convenience wrapper to return a result with a Firth error.
pub type FirthResult<T> = Result<T, Error>;

/// A note attached to an error, pointing at a secondary location.
#[derive(Clone)]
struct Note {
    message: String,
    pos: GPosIdx,
}

/// Errors generated by the compiler
#[derive(Clone)]
pub struct Error {
    kind: Box<ErrorKind>,
    pos: GPosIdx,
    /// Secondary locations relevant to the error.
    notes: Vec<Note>,
}

/// The different kinds of errors
#[derive(Clone)]
enum ErrorKind {
    /// The IR has a malformed structure.
    MalformedStructure(String),
    /// An annotation targets the wrong kind of IR object or conflicts with
    /// another annotation.
    InvalidAnnotation(String),
    /// The name has not been bound
    Undefined(Id, String),
    /// An internal assumption of a pass was violated.
    PassAssumption(String),
    /// A miscellaneous error.
    Misc(String),
    /// A group of independent errors reported together.
    Multi(Vec<Error>),
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::MalformedStructure(msg)
            | ErrorKind::InvalidAnnotation(msg)
            | ErrorKind::PassAssumption(msg)
            | ErrorKind::Misc(msg) => write!(f, "{msg}"),
            ErrorKind::Undefined(name, typ) => {
                write!(f, "undefined {typ} `{name}'")
            }
            ErrorKind::Multi(errs) => {
                let mut first = true;
                for err in errs {
                    if !first {
                        writeln!(f)?;
                    }
                    write!(f, "{err}")?;
                    first = false;
                }
                Ok(())
            }
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let ErrorKind::Multi(_) = &*self.kind {
            return write!(f, "{}", self.kind);
        }
        match self.pos.into_option() {
            Some(pos) => write!(f, "{}", pos.format(self.kind.to_string()))?,
            None => write!(f, "{}", self.kind)?,
        }
        for note in &self.notes {
            writeln!(f)?;
            match note.pos.into_option() {
                Some(pos) => write!(f, "{}", pos.format(&note.message))?,
                None => write!(f, "note: {}", note.message)?,
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}

impl std::error::Error for Error {}

impl Error {
    pub fn malformed_structure<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::MalformedStructure(msg.to_string()))
    }

    pub fn invalid_annotation<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::InvalidAnnotation(msg.to_string()))
    }

    pub fn undefined<S: ToString>(name: Id, typ: S) -> Self {
        Self::new(ErrorKind::Undefined(name, typ.to_string()))
    }

    pub fn pass_assumption<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::PassAssumption(msg.to_string()))
    }

    pub fn misc<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::Misc(msg.to_string()))
    }

    /// Group several independent errors into one.
    pub fn multi(errs: Vec<Error>) -> Self {
        debug_assert!(!errs.is_empty());
        Self::new(ErrorKind::Multi(errs))
    }

    fn new(kind: ErrorKind) -> Self {
        Self {
            kind: Box::new(kind),
            pos: GPosIdx::UNKNOWN,
            notes: Vec::new(),
        }
    }

    /// Attach a source position to this error.
    pub fn with_pos<T: WithPos>(mut self, pos: &T) -> Self {
        self.pos = pos.copy_span();
        self
    }

    /// Attach a note pointing at a secondary location.
    pub fn with_note<S: ToString, T: WithPos>(
        mut self,
        message: S,
        pos: &T,
    ) -> Self {
        self.notes.push(Note {
            message: message.to_string(),
            pos: pos.copy_span(),
        });
        self
    }

    /// The number of notes attached to this error.
    pub fn num_notes(&self) -> usize {
        self.notes.len()
    }

    /// The primary message of this error, without positions or notes.
    pub fn message(&self) -> String {
        self.kind.to_string()
    }

    /// The errors grouped in this error. A plain error yields itself.
    pub fn iter(&self) -> impl Iterator<Item = &Error> {
        match &*self.kind {
            ErrorKind::Multi(errs) => errs.iter(),
            _ => std::slice::from_ref(self).iter(),
        }
    }
}
