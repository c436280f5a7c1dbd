pub mod backups;
pub mod login;

pub use backups::BackupsPage;
pub use login::LoginPage;
