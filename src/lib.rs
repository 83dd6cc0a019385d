pub mod git;

// Re-export the types most callers touch
pub use git::status::{FileChange, FileStatus, RepoStatus, parse_status};
pub use git::{Repository, ResetMode};
