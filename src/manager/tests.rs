//! Tests for the connection manager, driven by a scripted client and pool on a
//! paused clock.


use super::ConnectionManager;
use crate::config::{ClientConfiguration, Config};
use crate::test_utils::{MockPool, MockValidator, init_tracing};
use std::sync::Arc;

type TestManager = ConnectionManager<Arc<MockPool>, MockValidator>;

fn setup() -> (TestManager, Arc<MockPool>) {
    init_tracing();
    let configuration = ClientConfiguration::new("plant");
    let pool = MockPool::for_configuration(&configuration);
    let manager = ConnectionManager::from_configuration(
        pool.clone(),
        MockValidator::new(),
        configuration,
        Config::default(),
    );
    (manager, pool)
}
