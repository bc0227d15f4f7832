pub mod account;
pub mod coordinate;
pub mod post;
pub mod session;

pub use account::{AccountRow, SessionUserRow};
pub use coordinate::Coordinate;
pub use post::{NewPost, Post};
pub use session::{Session, SessionEnded};
