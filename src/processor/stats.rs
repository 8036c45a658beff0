/// Single-pass min/max/mean/std over a scalar series (Welford's algorithm).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunningStats {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    mean: f64,
    m2: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StatsSnapshot {
    pub min: f64,
    pub mean: f64,
    pub max: f64,
    pub std: f64,
}

impl StatsSnapshot {
    /// Re-expresses every field in multiples of `unit`.
    pub fn in_units(self, unit: f64) -> Self {
        Self {
            min: self.min / unit,
            mean: self.mean / unit,
            max: self.max / unit,
            std: self.std / unit,
        }
    }
}

impl RunningStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        if self.count == 1 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }

        let n = self.count as f64;
        let delta = value - self.mean;
        self.mean += delta / n;
        let delta2 = value - self.mean;
        self.m2 += delta * delta2;
    }

    #[inline]
    pub fn count(&self) -> u64 { self.count }

    #[inline]
    pub fn sum(&self) -> f64 { self.sum }

    #[inline]
    pub fn is_empty(&self) -> bool { self.count == 0 }

    /// Population variance; zero for fewer than two observations.
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            return 0.0;
        }
        (self.m2 / self.count as f64).max(0.0)
    }

    /// All zeros when nothing was observed.
    pub fn snapshot(&self) -> StatsSnapshot {
        if self.is_empty() {
            return StatsSnapshot::default();
        }
        StatsSnapshot {
            min: self.min,
            mean: self.mean,
            max: self.max,
            std: self.variance().sqrt(),
        }
    }
}
