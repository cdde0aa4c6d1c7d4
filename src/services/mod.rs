pub mod campaign;
pub mod credits;
pub mod encryption;
pub mod generation;
pub mod retry;
pub mod reward;
pub mod session;
pub mod threads;
pub mod threads_auth;
pub mod video_backend;
