pub mod age;
pub mod alert;
pub mod cmd;
pub mod config;
pub mod display;
pub mod launcher;
pub mod location;
pub mod wakelock;
#[cfg(test)]
pub(crate) mod testing;
