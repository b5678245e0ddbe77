//! Safe configuration changes for an Unbound-based DNS appliance.
//!
//! An upstream configuration is rendered, validated, written, reloaded and
//! self-tested as one transaction; any failure restores the snapshot taken
//! before the first write.

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;

#[cfg(test)]
mod test_support;
