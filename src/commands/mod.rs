pub mod profiles;
pub mod run;
pub mod setup;
pub mod status;
pub mod utils;
