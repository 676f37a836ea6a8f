pub mod avatars;
pub mod highlights;
pub mod matches;
pub mod videos;
pub mod webhook;
