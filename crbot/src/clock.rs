use std::time::{Duration, Instant};

/// Source of time for the tracker cache, retry backoff and step delays.
pub trait Clock {
	fn now(&self) -> Instant;
	fn sleep(&self, duration: Duration);
}

/// Wall clock backed by `std::thread::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> Instant {
		Instant::now()
	}

	fn sleep(&self, duration: Duration) {
		if !duration.is_zero() {
			std::thread::sleep(duration);
		}
	}
}

impl<C: Clock + ?Sized> Clock for &C {
	fn now(&self) -> Instant {
		(**self).now()
	}

	fn sleep(&self, duration: Duration) {
		(**self).sleep(duration)
	}
}

#[cfg(test)]
pub use manual::ManualClock;

#[cfg(test)]
mod manual {
	use std::cell::{Cell, RefCell};

	use super::*;

	/// Clock that only moves when slept on or advanced. Records every sleep.
	#[derive(Debug)]
	pub struct ManualClock {
		now: Cell<Instant>,
		sleeps: RefCell<Vec<Duration>>,
	}

	impl ManualClock {
		pub fn new() -> Self {
			Self { now: Cell::new(Instant::now()), sleeps: RefCell::new(Vec::new()) }
		}

		pub fn advance(&self, by: Duration) {
			self.now.set(self.now.get() + by);
		}

		pub fn sleeps(&self) -> Vec<Duration> {
			self.sleeps.borrow().clone()
		}
	}

	impl Clock for ManualClock {
		fn now(&self) -> Instant {
			self.now.get()
		}

		fn sleep(&self, duration: Duration) {
			self.sleeps.borrow_mut().push(duration);
			self.advance(duration);
		}
	}
}
