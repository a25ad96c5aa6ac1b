//! The `common` crate provides the pieces shared by the device farm binaries: command line
//! configuration, the [`FleetTag`] naming scheme, tracing setup and AWS client wrappers.
//!
//! [`FleetTag`]: fleet_tag::FleetTag

pub mod aws;
pub mod clap;
pub mod fleet_tag;
pub mod tracing;
