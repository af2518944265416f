//! Retry policy for optimistic commits
//!
//! A lost commit race is retried after a randomized delay so that two workers
//! fighting over the same hot key fall out of lockstep. The delay source is
//! an explicit [`Jitter`] value: tests use [`Jitter::None`] or a fixed
//! function, production uses [`Jitter::Uniform`].

use rand::Rng;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Source of the delay slept between attempts
#[derive(Clone)]
pub enum Jitter {
    /// Retry immediately
    None,
    /// Uniformly random delay in `[min, max]`
    Uniform { min: Duration, max: Duration },
    /// Delay computed from the (1-based) attempt that just failed
    Custom(Arc<dyn Fn(u32) -> Duration + Send + Sync>),
}

impl Jitter {
    /// Custom jitter from a function of the failed attempt number
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        Jitter::Custom(Arc::new(f))
    }

    /// Delay to sleep after `attempt` failed
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            Jitter::None => Duration::ZERO,
            Jitter::Uniform { min, max } => {
                if max <= min {
                    *min
                } else {
                    rand::thread_rng().gen_range(*min..=*max)
                }
            }
            Jitter::Custom(f) => f(attempt),
        }
    }
}

impl fmt::Debug for Jitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Jitter::None => write!(f, "None"),
            Jitter::Uniform { min, max } => write!(f, "Uniform({:?}..={:?})", min, max),
            Jitter::Custom(_) => write!(f, "Custom"),
        }
    }
}

/// How many times a conflicting commit is attempted and how long to wait
/// between attempts
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total commit attempts, including the first
    pub max_attempts: u32,
    pub jitter: Jitter,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            jitter: Jitter::Uniform {
                min: Duration::from_millis(5),
                max: Duration::from_millis(50),
            },
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, jitter: Jitter) -> Self {
        Self {
            max_attempts,
            jitter,
        }
    }

    /// Policy that never sleeps; for tests
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Jitter::None)
    }

    /// Sleep the jittered delay after `attempt` failed
    pub async fn pause(&self, attempt: u32) {
        let delay = self.jitter.delay(attempt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_jitter() {
        assert_eq!(Jitter::None.delay(3), Duration::ZERO);
    }

    #[test]
    fn test_uniform_jitter_stays_in_bounds() {
        let jitter = Jitter::Uniform {
            min: Duration::from_millis(5),
            max: Duration::from_millis(50),
        };
        for attempt in 1..200 {
            let d = jitter.delay(attempt);
            assert!(d >= Duration::from_millis(5) && d <= Duration::from_millis(50));
        }
    }

    #[test]
    fn test_uniform_jitter_degenerate_range() {
        let jitter = Jitter::Uniform {
            min: Duration::from_millis(7),
            max: Duration::from_millis(3),
        };
        assert_eq!(jitter.delay(1), Duration::from_millis(7));
    }

    #[test]
    fn test_custom_jitter_sees_attempt() {
        let jitter = Jitter::custom(|attempt| Duration::from_millis(attempt as u64 * 10));
        assert_eq!(jitter.delay(1), Duration::from_millis(10));
        assert_eq!(jitter.delay(4), Duration::from_millis(40));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_sleeps_for_delay() {
        let policy = RetryPolicy::new(3, Jitter::custom(|_| Duration::from_secs(2)));
        let start = tokio::time::Instant::now();
        policy.pause(1).await;
        assert!(start.elapsed() >= Duration::from_secs(2));
    }
}
