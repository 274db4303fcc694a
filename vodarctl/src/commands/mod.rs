pub mod fetch;
pub mod run;
pub mod vods;
