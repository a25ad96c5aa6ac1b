//! Declares a fleet of EC2 instances, one per operating system and architecture, that
//! enroll themselves as AWS IoT Greengrass core devices on first boot. The fleet is
//! rendered as a CloudFormation template.

pub mod bootstrap;
pub mod error;
pub mod fleet;
pub mod identity;
pub mod images;
pub mod key_pair;
pub mod network;
pub mod policy;
pub mod scripts;
pub mod stack;
pub mod template;
pub mod variant;

pub use error::{Error, Result};
pub use stack::{DeviceFarmStack, StackConfig, SynthesizedStack};
