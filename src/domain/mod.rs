pub mod dependency;
pub mod issue_type;
pub mod review;
pub mod status;
