mod checker;
pub mod rules;
pub mod scope;

pub use checker::{
    CheckFailure, CheckOptions, FailureKind, SourceFailure, VerifiedProof, check_source,
};
