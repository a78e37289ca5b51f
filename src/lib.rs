pub mod auth;
pub mod config;
pub mod domain;
pub mod eligibility;
pub mod error;
pub mod manager;
pub mod output;
pub mod remote;
pub mod runfolder;
