pub mod dtr_input;

pub use dtr_input::{DecisionInput, EntryStatusInput};
