pub use super::media::Entity as Media;
pub use super::users::Entity as Users;
