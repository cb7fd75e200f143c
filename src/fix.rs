//! Best-of-window position fix selection.
//!
//! A device streams fixes of varying accuracy for a short while after a
//! location request. The selector keeps the most accurate one and resolves as
//! soon as a fix is good enough, or when the wait window closes. It owns no
//! clock: callers pass the elapsed time with every fix.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{OptionExt, Result};
use crate::PositionFix;

/// Configuration for fix selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixConfig {
    /// How long to wait for fixes before settling for the best so far.
    /// Default: 9 seconds
    pub max_wait: Duration,

    /// Resolve immediately on a fix at least this accurate (meters).
    /// Default: 25.0 meters
    pub desired_accuracy_meters: f64,
}

impl Default for FixConfig {
    fn default() -> Self {
        Self {
            max_wait: Duration::from_millis(9000),
            desired_accuracy_meters: 25.0,
        }
    }
}

/// State of a selection after a fix was offered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FixProgress {
    /// Keep listening
    Pending,
    /// Selection finished with this fix
    Resolved(PositionFix),
}

/// Picks the most accurate fix from a bounded stream.
#[derive(Debug, Clone)]
pub struct FixSelector {
    config: FixConfig,
    best: Option<PositionFix>,
    resolved: bool,
}

impl FixSelector {
    pub fn new(config: FixConfig) -> Self {
        Self {
            config,
            best: None,
            resolved: false,
        }
    }

    /// Most accurate fix seen so far.
    pub fn best(&self) -> Option<&PositionFix> {
        self.best.as_ref()
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// Offer a fix received `elapsed` after the request started.
    ///
    /// Invalid fixes are rejected without affecting the selection. Once resolved,
    /// further fixes are ignored and the resolved fix is returned again.
    pub fn offer(&mut self, fix: PositionFix, elapsed: Duration) -> Result<FixProgress> {
        if self.resolved {
            return Ok(self.best.map_or(FixProgress::Pending, FixProgress::Resolved));
        }
        fix.validate()?;

        if self
            .best
            .map_or(true, |best| fix.accuracy_meters < best.accuracy_meters)
        {
            self.best = Some(fix);
        }

        if fix.accuracy_meters <= self.config.desired_accuracy_meters
            || elapsed >= self.config.max_wait
        {
            self.resolved = true;
            return Ok(self.best.map_or(FixProgress::Pending, FixProgress::Resolved));
        }

        Ok(FixProgress::Pending)
    }

    /// Settle when the wait window closes without a resolving fix.
    pub fn finish(self) -> Result<PositionFix> {
        self.best
            .ok_or_position_unavailable("no GPS fix received, check location permissions")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RoadSnapError;

    fn fix(accuracy: f64) -> PositionFix {
        PositionFix::new(48.839428, -99.744865, accuracy)
    }

    #[test]
    fn test_resolves_early_on_good_fix() {
        let mut selector = FixSelector::new(FixConfig::default());
        assert_eq!(
            selector.offer(fix(80.0), Duration::from_millis(500)).unwrap(),
            FixProgress::Pending
        );
        assert_eq!(
            selector.offer(fix(20.0), Duration::from_millis(1500)).unwrap(),
            FixProgress::Resolved(fix(20.0))
        );
        assert!(selector.is_resolved());
    }

    #[test]
    fn test_timeout_returns_best_not_latest() {
        let mut selector = FixSelector::new(FixConfig::default());
        selector.offer(fix(60.0), Duration::from_secs(1)).unwrap();
        selector.offer(fix(40.0), Duration::from_secs(4)).unwrap();
        let progress = selector.offer(fix(70.0), Duration::from_secs(9)).unwrap();
        assert_eq!(progress, FixProgress::Resolved(fix(40.0)));
    }

    #[test]
    fn test_ignores_fixes_after_resolution() {
        let mut selector = FixSelector::new(FixConfig::default());
        selector.offer(fix(10.0), Duration::from_secs(1)).unwrap();
        let progress = selector.offer(fix(5.0), Duration::from_secs(2)).unwrap();
        assert_eq!(progress, FixProgress::Resolved(fix(10.0)));
    }

    #[test]
    fn test_invalid_fix_rejected() {
        let mut selector = FixSelector::new(FixConfig::default());
        let err = selector
            .offer(fix(-1.0), Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, RoadSnapError::InvalidFix { .. }));
        assert!(selector.best().is_none());
    }

    #[test]
    fn test_finish_without_fix() {
        let selector = FixSelector::new(FixConfig::default());
        assert!(matches!(
            selector.finish(),
            Err(RoadSnapError::PositionUnavailable { .. })
        ));
    }

    #[test]
    fn test_finish_with_pending_best() {
        let mut selector = FixSelector::new(FixConfig::default());
        selector.offer(fix(45.0), Duration::from_secs(2)).unwrap();
        assert_eq!(selector.finish().unwrap(), fix(45.0));
    }
}
