pub mod ask;
pub mod home;
pub mod stats;
