//! Blocking delays and a monotonic clock.
//!
//! The supervisor sleeps between retries and ticks through [`Delay`]; the
//! session adapter schedules keepalive pings against [`Clock`].

/// Blocks the calling thread.
pub trait Delay {
    /// Sleep for `ms` milliseconds.
    fn delay_ms(&mut self, ms: u32);
}

/// Monotonic milliseconds since an arbitrary origin.
pub trait Clock {
    /// Current time in milliseconds. Must never go backwards.
    fn now_ms(&self) -> u64;
}

impl<T: Delay + ?Sized> Delay for &mut T {
    fn delay_ms(&mut self, ms: u32) {
        (**self).delay_ms(ms)
    }
}

impl<T: Clock + ?Sized> Clock for &T {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}

/// Convert a configured number of seconds to milliseconds, saturating.
pub(crate) fn secs_to_ms(secs: u32) -> u32 {
    secs.saturating_mul(1000)
}
