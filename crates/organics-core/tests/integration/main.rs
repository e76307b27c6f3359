//! Integration tests for organics-core
//!
//! Uses wiremock to stand in for the organics backend and drives the session
//! and account sync components through the real `ApiClient`.

mod common;

mod test_account_sync;
mod test_session;
