// Library crate: the snapping engine, the headless host used by tests and
// scripts, and the JSON command protocol.

pub mod camera;
pub mod command;
pub mod error;
pub mod fixtures;
pub mod harness;
pub mod helpers;
pub mod host;
pub mod picking;
pub mod session;
pub mod settings;
pub mod snapdata;
