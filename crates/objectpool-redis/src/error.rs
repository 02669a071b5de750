use objectpool_core::PoolError;

/// Every `redis::RedisError` this adapter sees becomes a [`PoolError::Transport`] -
/// the pool core's retry loop already knows how to treat that as transient;
/// this crate never tries to second-guess which Redis errors are
/// "really" a logic bug.
pub fn redis_err(err: redis::RedisError) -> PoolError {
    PoolError::Transport(err.into())
}

pub fn malformed(err: impl std::fmt::Display) -> PoolError {
    PoolError::MalformedResponse(err.to_string())
}
