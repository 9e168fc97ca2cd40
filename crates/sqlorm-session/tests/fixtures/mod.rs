//! Test fixtures for sqlorm-session.

pub mod mock_types;
