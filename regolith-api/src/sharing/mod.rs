//! Sharing, endorsement and public visibility of user artifacts

pub mod bless;
pub mod collection;
pub mod magic_link;
pub mod references;
pub mod simple;
pub mod visibility;
pub mod workspace;
