//! Domain entities representing core business objects.

pub mod notification;
pub mod verification_code;

// Re-export commonly used types
pub use notification::{arg_values, NamedArg, NewRetryTask, RetryTask, RetryTaskStatus};
pub use verification_code::{
    codes_match, CodeKey, IssuePolicy, VerificationRecord, VerifyOutcome,
};
