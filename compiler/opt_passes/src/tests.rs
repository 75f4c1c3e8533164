use super::{init_tracing, TRACING_INIT};

#[test]
fn init_tracing_is_idempotent() {
    init_tracing();
    assert!(TRACING_INIT.is_completed());
    // A second install would panic inside `init`.
    init_tracing();
    tracing::debug!("tracing initialized twice");
}
