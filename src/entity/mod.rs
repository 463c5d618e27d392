pub mod comment;
pub mod follow;
pub mod like;
pub mod post;
pub mod retweet;
pub mod user;
