mod base;
mod db;

pub use base::{ElectionCore, ElectionSettings, NewElection};
pub use db::Election;
