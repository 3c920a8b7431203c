use chrono::{DateTime, Utc};

/// A source of the current time.
///
/// The trait is implemented for functions returning `DateTime<Utc>`, which makes it easy to pin
/// or step time in tests.
pub trait Clock {
    /// The current time.
    fn now(&self) -> DateTime<Utc>;
}

impl<F> Clock for F
where
    F: Fn() -> DateTime<Utc>,
{
    fn now(&self) -> DateTime<Utc> {
        self()
    }
}

/// The system wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
