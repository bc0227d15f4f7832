pub mod viewer;

pub use viewer::{attach_viewer, VIEW_COOKIE};
