use bourse_core::Timestamp;

/// Port for time abstraction
///
/// Order and trade timestamps come from here so tests can pin time.
pub trait Clock: Send + Sync {
    /// Get the current time according to this clock
    fn now(&self) -> Timestamp;

    /// Get the clock's name/identifier for debugging
    fn name(&self) -> &str {
        "Clock"
    }
}
