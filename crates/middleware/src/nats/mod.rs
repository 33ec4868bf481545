pub mod subjects;
mod transport;

pub use subjects::{subject_matches, SubjectBuilder};
pub use transport::NatsTransport;
