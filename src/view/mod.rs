pub mod graph;
pub mod state;

pub use graph::ViewSettings;
pub use state::{ViewState, ViewStatus};
