//! Label repository and label association index.

pub mod associations;
pub mod repository;

pub use associations::LabelAssociationIndex;
pub use repository::{LabelEditOutcome, LabelRepository, predefined_labels};
