//! Classifier port - accept/reject gate for uploaded objects.
//!
//! Treated as a black box: it sees the object key only, never the bytes.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject(String),
}

impl Verdict {
    pub fn is_accept(&self) -> bool {
        matches!(self, Verdict::Accept)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Accept => f.write_str("accept"),
            Verdict::Reject(reason) => write!(f, "reject ({reason})"),
        }
    }
}

pub trait Classifier: Send + Sync {
    fn classify(&self, object_key: &str) -> Verdict;
}
