// Command handlers

pub mod inspect;
pub mod run;

pub use inspect::{read_payload, InspectCommand};
pub use run::{RunCommand, RunOutput};
