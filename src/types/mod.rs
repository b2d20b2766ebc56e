//! Type definitions

pub mod appointment;
pub mod booking;
pub mod cleaner;
pub mod home;
pub mod messages;
pub mod notification;
pub mod preferred;
pub mod review;

pub use appointment::*;
pub use booking::*;
pub use cleaner::*;
pub use home::*;
pub use messages::*;
pub use notification::*;
pub use preferred::*;
pub use review::*;
