mod desc;
mod results;
mod spec;

pub use desc::{CandidateDescription, CandidateDetail, ElectionDescription};
pub use results::ElectionResults;
pub use spec::{ElectionEdit, ElectionSpec};
