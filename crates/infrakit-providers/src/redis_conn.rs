use infrakit_core::{InfraError, Result};
use redis::aio::ConnectionManager;

/// Opens the single multiplexed connection an adapter keeps for its lifetime.
pub(crate) async fn connect(url: &str) -> Result<ConnectionManager> {
    let client = redis::Client::open(url)
        .map_err(|e| InfraError::ParseError(format!("unable to parse redis url '{url}': {e}")))?;
    client
        .get_connection_manager()
        .await
        .map_err(|e| InfraError::ConnectionError(format!("unable to connect redis at '{url}': {e}")))
}

pub(crate) fn backend_error(err: redis::RedisError) -> InfraError {
    InfraError::BackendError(err.to_string())
}
