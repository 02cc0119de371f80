//! Channel-backed fakes of the platform collaborators, for unit and
//! integration tests.

pub mod mock_adapter;
pub mod mock_profile;
pub mod mock_status;
