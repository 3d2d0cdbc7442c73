pub mod notes;
pub mod sections;
