pub mod socket_guard;
pub mod wiki_mock;
