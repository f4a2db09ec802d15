pub mod experience;
pub mod onboard;
pub mod resolve;
pub mod run_cmd;
pub mod status;
