pub mod bootstrap;
pub mod email;

pub use bootstrap::ensure_initial_admin;
pub use email::EmailService;
