//! Database queries

pub mod appointment;
pub mod cleaner;
pub mod home;
pub mod notification;
pub mod preferred_cleaner;
