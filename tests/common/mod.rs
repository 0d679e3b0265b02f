//! Shared setup for HTTP integration tests

use axum_test::TestServer;
use std::sync::Arc;

use grout::{
    config::Config,
    services::Renderer,
    web::{AppState, create_router},
};

/// Renderer with only the bundled fonts, so raster output does not depend
/// on what the test host has installed
pub fn test_state(config: Config) -> AppState {
    let renderer = Arc::new(Renderer::with_fontdb(
        &config.render,
        Arc::new(usvg::fontdb::Database::new()),
    ));
    AppState::with_renderer(config, renderer).expect("valid test configuration")
}

pub fn test_server(config: Config) -> (TestServer, AppState) {
    let state = test_state(config);
    let server = TestServer::new(create_router(state.clone())).expect("test server");
    (server, state)
}
