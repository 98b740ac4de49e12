//! Clock and delay abstraction providing the timing primitives required by
//! frame timeouts, reassembly deadlines and the adapter service cadence.

/// Timer trait abstraction; `now_ms` must be monotonic.
pub trait TpTimer {
    /// Milliseconds elapsed since an arbitrary fixed origin.
    fn now_ms(&self) -> u64;

    /// Asynchronously wait for `millis` milliseconds.
    fn delay_ms<'a>(
        &'a mut self,
        millis: u32,
    ) -> impl core::future::Future<Output = ()> + 'a;
}

/// [`TpTimer`] backed by the `embassy-time` driver of the target.
#[cfg(feature = "embassy-clock")]
#[derive(Debug, Default, Clone, Copy)]
pub struct EmbassyTimer;

#[cfg(feature = "embassy-clock")]
impl TpTimer for EmbassyTimer {
    fn now_ms(&self) -> u64 {
        embassy_time::Instant::now().as_millis()
    }

    fn delay_ms<'a>(
        &'a mut self,
        millis: u32,
    ) -> impl core::future::Future<Output = ()> + 'a {
        embassy_time::Timer::after_millis(millis as u64)
    }
}
