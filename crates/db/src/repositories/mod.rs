//! Repository layer for database operations.

mod category;
mod favorite;
mod profile;
mod prompt;
mod review;
mod stats;
mod tag;
mod user;

pub use category::CategoryRepository;
pub use favorite::FavoriteRepository;
pub use profile::ProfileRepository;
pub use prompt::{
    AuthorTotals, NewPrompt, PromptChanges, PromptFilter, PromptRepository, PromptSitemapRow,
    PromptSort,
};
pub use review::ReviewRepository;
pub use stats::{PromptStats, StatsRepository};
pub use tag::TagRepository;
pub use user::UserRepository;

/// Escape `LIKE` wildcards in user input.
pub(crate) fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
