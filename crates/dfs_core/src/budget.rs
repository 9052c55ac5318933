use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Run budget shared by optimizer and simulator workers.
/// Tracks a wall clock deadline and a cooperative cancel flag.
#[derive(Debug, Clone)]
pub struct RunBudget {
    start_time: Instant,
    max_wall_ms: Option<u64>, // None = no deadline
    cancelled: Arc<AtomicBool>,
}

impl Default for RunBudget {
    fn default() -> Self {
        Self::unlimited()
    }
}

impl RunBudget {
    /// Budget with no deadline; only `cancel()` stops it
    pub fn unlimited() -> Self {
        Self { start_time: Instant::now(), max_wall_ms: None, cancelled: Arc::new(AtomicBool::new(false)) }
    }

    /// Budget that expires `max_wall_ms` after creation
    pub fn with_deadline_ms(max_wall_ms: u64) -> Self {
        Self { max_wall_ms: Some(max_wall_ms), ..Self::unlimited() }
    }

    /// Optional deadline, as carried by requests
    pub fn from_deadline_ms(max_wall_ms: Option<u64>) -> Self {
        match max_wall_ms {
            Some(ms) => Self::with_deadline_ms(ms),
            None => Self::unlimited(),
        }
    }

    /// Handle that cancels every clone of this budget
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Request cooperative cancellation
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Reset the budget timer (for reuse). The cancel flag is kept.
    pub fn reset(&mut self) {
        self.start_time = Instant::now();
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Check if wall clock time exceeded
    #[inline]
    pub fn is_timeout(&self) -> bool {
        match self.max_wall_ms {
            Some(ms) => self.start_time.elapsed() > Duration::from_millis(ms),
            None => false,
        }
    }

    /// Check if the run should stop
    #[inline]
    pub fn is_exceeded(&self) -> bool {
        self.is_cancelled() || self.is_timeout()
    }

    /// Get elapsed time in milliseconds
    pub fn elapsed_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    /// Get reason for budget exceeded (if any)
    pub fn exceeded_reason(&self) -> Option<String> {
        if self.is_cancelled() {
            Some("Cancelled".to_string())
        } else if self.is_timeout() {
            Some(format!("Wall clock timeout: {}ms > {}ms", self.elapsed_ms(), self.max_wall_ms.unwrap_or(0)))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlimited_budget_never_expires() {
        let budget = RunBudget::unlimited();
        assert!(!budget.is_exceeded());
        assert!(budget.exceeded_reason().is_none());
    }

    #[test]
    fn test_zero_deadline_expires() {
        let budget = RunBudget::with_deadline_ms(0);
        std::thread::sleep(Duration::from_millis(2));
        assert!(budget.is_timeout());
        assert!(budget.exceeded_reason().unwrap().contains("timeout"));
    }

    #[test]
    fn test_cancel_reaches_clones() {
        let budget = RunBudget::unlimited();
        let worker_copy = budget.clone();
        budget.cancel_handle().store(true, Ordering::Relaxed);
        assert!(worker_copy.is_exceeded());
        assert_eq!(worker_copy.exceeded_reason().as_deref(), Some("Cancelled"));
    }
}
