// File: ./src/model/mod.rs
pub mod display;
pub mod parser;
pub mod series;
pub mod status;

pub use series::{RemoteSettings, SettingsPatch, TrackerSettings};
pub use status::{
    CheckReport, StatusClassification, StatusSection, StatusSource, classify,
};
