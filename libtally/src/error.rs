use chrono::NaiveDate;
use thiserror::Error;

use crate::model::Directive;

pub type Result<T> = std::result::Result<T, JournalError>;

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("unknown account `{0}'")]
    UnknownAccount(String),

    #[error("unknown commodity `{0}'")]
    UnknownCommodity(String),

    #[error(transparent)]
    Directive(#[from] Box<DirectiveError>),

    #[error("no price found to convert {commodity} into {target} as of {date}")]
    UnreachablePosition {
        date: NaiveDate,
        commodity: String,
        target: String,
    },

    #[error("cancelled")]
    Cancelled,
}

#[derive(Debug, Error)]
#[error("{}:\n{}\n{}\n", .directive.range(), .directive, .message)]
pub struct DirectiveError {
    pub kind: ErrorKind,
    pub directive: Directive,
    pub message: String,
}

impl DirectiveError {
    pub fn new(kind: ErrorKind, directive: Directive, message: String) -> JournalError {
        JournalError::Directive(Box::new(DirectiveError {
            kind,
            directive,
            message,
        }))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    AccountAlreadyOpen,
    AccountNotOpen,
    AccountHasResidualBalance,
    AssertionFailed,
    UnreachableValuation,
}

impl JournalError {
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            JournalError::Directive(e) => Some(e.kind),
            JournalError::UnreachablePosition { .. } => Some(ErrorKind::UnreachableValuation),
            _ => None,
        }
    }
}
