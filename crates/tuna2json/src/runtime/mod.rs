//! Runtime module — process lifecycle: boot, run, exit.

pub mod boot;
pub mod run;
