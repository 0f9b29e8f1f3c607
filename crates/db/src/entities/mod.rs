//! Database entities.

pub mod category;
pub mod favorite;
pub mod profile;
pub mod prompt;
pub mod prompt_tag;
pub mod review;
pub mod tag;
pub mod user;

pub use category::Entity as Category;
pub use favorite::Entity as Favorite;
pub use profile::Entity as Profile;
pub use prompt::Entity as Prompt;
pub use prompt_tag::Entity as PromptTag;
pub use review::Entity as Review;
pub use tag::Entity as Tag;
pub use user::Entity as User;
