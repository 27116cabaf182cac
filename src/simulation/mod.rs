//! Machine simulation

pub mod machine;

pub use machine::{transition, Machine, MachineState};
