pub mod is_elevated;
pub mod retry;
