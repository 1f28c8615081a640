/// Outcome of comparing the local position with the authoritative one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Correction {
    /// Hard seek of the local surface to this position.
    Seek(f64),
    WithinTolerance { delta: f64 },
}

/// Follower side drift check. Corrections are hard seeks, no slewing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriftReconciler {
    tolerance: f64,
}

impl DriftReconciler {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn reconcile(&self, local: f64, authoritative: f64) -> Correction {
        if !authoritative.is_finite() {
            return Correction::WithinTolerance { delta: 0.0 };
        }
        // a surface without a usable position is always out of sync
        if !local.is_finite() {
            return Correction::Seek(authoritative);
        }

        let delta = (local - authoritative).abs();
        if delta > self.tolerance {
            Correction::Seek(authoritative)
        } else {
            Correction::WithinTolerance { delta }
        }
    }
}
