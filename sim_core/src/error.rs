use thiserror::Error;

/// True API-boundary failures. Game-logic failures (a blocked move, an
/// empty stockpile, a frozen target) are never represented here — they are
/// plain `bool`/`Option` returns from the mutating methods that encounter
/// them, the same way `TurnQueue::submit_orders` is the only `Result`-typed
/// surface in the teacher's order-submission code and everything below it
/// is infallible bookkeeping.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("grid/registry invariant violated at tick {tick}: {detail}")]
    InvariantViolation { tick: u64, detail: String },

    #[error("resource exhausted: {0}")]
    ResourceExhaustion(String),

    #[error("position out of bounds: ({x}, {y})")]
    OutOfBounds { x: i32, y: i32 },
}

pub type CoreResult<T> = Result<T, CoreError>;
