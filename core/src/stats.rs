//! Human-readable run statistics.
//!
//! The layout is advisory. MAC counts and ops/us derive directly from the
//! layer stats, and divisions by a zero time print `n/a`.

use alloc::format;
use alloc::vec::Vec;
use core::fmt;

/// One row of the per-layer table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerReport {
    /// 1-based position in the execution order.
    pub index: usize,
    pub name: &'static str,
    pub time_us: u64,
    pub macs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelStats {
    pub layers: Vec<LayerReport>,
}

impl ModelStats {
    pub fn new(layers: Vec<LayerReport>) -> Self {
        Self { layers }
    }

    pub fn total_macs(&self) -> u64 {
        self.layers.iter().map(|l| l.macs).sum()
    }

    /// Sum of the layers' last run times.
    pub fn total_time_us(&self) -> u64 {
        self.layers.iter().map(|l| l.time_us).sum()
    }

    /// MACs per microsecond; `None` when no time was recorded.
    pub fn efficiency(&self) -> Option<f64> {
        ops_per_us(self.total_macs(), self.total_time_us())
    }
}

pub(crate) fn ops_per_us(ops: u64, time_us: u64) -> Option<f64> {
    if time_us == 0 {
        None
    } else {
        Some(ops as f64 / time_us as f64)
    }
}

/// A MAC count scaled to k / M / G with two decimals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Macs(pub u64);

impl fmt::Display for Macs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.0;
        let text = if n < 10_000 {
            format!("{}", n)
        } else if n < 1_000_000 {
            format!("{:.2}k", n as f64 / 1e3)
        } else if n < 1_000_000_000 {
            format!("{:.2}M", n as f64 / 1e6)
        } else {
            format!("{:.2}G", n as f64 / 1e9)
        };
        f.pad(&text)
    }
}

/// `Some(x)` as `x` with two decimals, `None` as `n/a`.
pub(crate) struct Ratio(pub Option<f64>);

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(v) => write!(f, "{:.2}", v),
            None => f.write_str("n/a"),
        }
    }
}

impl fmt::Display for ModelStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Layer(#)        -   Time(us)     ops(MACs)   ops/us")?;
        writeln!(f, "--------------------------------------------------------")?;
        for l in &self.layers {
            write!(f, "#{:<3} {:>10} -  {:>8}      ", l.index, l.name, l.time_us)?;
            if l.macs == 0 {
                writeln!(f)?;
            } else {
                writeln!(f, "{:>10}   {}", Macs(l.macs), Ratio(ops_per_us(l.macs, l.time_us)))?;
            }
        }
        writeln!(f)?;
        writeln!(f, "Summary:")?;
        writeln!(f, "Total ops (MAC): {} ({})", self.total_macs(), Macs(self.total_macs()))?;
        writeln!(f, "Prediction time: {}us", self.total_time_us())?;
        writeln!(f, "Efficiency: {} ops/us", Ratio(self.efficiency()))
    }
}
