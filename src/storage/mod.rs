//! SQLite persistence for users, feeds, follows, and posts.
//!
//! Every operation is a short, independent statement (or a small local
//! transaction) on a shared [`sqlx::SqlitePool`]. Nothing here holds a
//! transaction open across network I/O.

mod feeds;
mod follows;
mod posts;
mod schema;
mod types;
mod users;

pub use schema::Database;
pub use types::{
    CreatePostOutcome, DatabaseError, Feed, FeedFollow, FeedWithOwner, NewPost, Post, User,
};
