pub mod feedback;
pub mod query;
