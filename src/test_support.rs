use crate::config::EngineConfig;
use crate::state::AppState;

/// Fresh engine state for route tests. The ingest worker is spawned on
/// the test runtime and dropped with it.
pub fn test_state() -> AppState {
    test_state_with(EngineConfig::default())
}

pub fn test_state_with(config: EngineConfig) -> AppState {
    let (state, _worker) = AppState::build(config);
    state
}
