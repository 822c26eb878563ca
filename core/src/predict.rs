//! Evaluation harness: drive a model over labelled samples and score it.
//!
//! A [`Prediction`] session borrows the model for its whole lifetime, so one
//! model can only be scored by one session at a time.
//!
//! Ranking rule: a class is ahead of the true label when its score is
//! strictly greater, or equal with a lower index. The rank is the number of
//! classes ahead. Top-1 is the first class holding the maximum score.

use alloc::vec::Vec;
use core::fmt;

use log::info;

use crate::clock::Clock;
use crate::error::{NanoError, NanoResult};
use crate::math::argmax_i8;
use crate::model::Model;
use crate::stats::{ops_per_us, Ratio};

/// Rank of `label` within `scores`; `None` if the label is out of range.
pub fn rank_of(scores: &[i8], label: usize) -> Option<usize> {
    let target = *scores.get(label)?;
    Some(
        scores
            .iter()
            .enumerate()
            .filter(|&(i, &s)| i != label && (s > target || (s == target && i < label)))
            .count(),
    )
}

pub struct Prediction<'m, C: Clock + ?Sized> {
    model: &'m mut Model,
    clock: &'m C,
    label_count: usize,
    top_k: Vec<u32>,
    confusion: Vec<u32>,
    frames: u32,
    run_time_us: u64,
    started_us: u64,
    total_time_us: Option<u64>,
}

impl<'m, C: Clock + ?Sized> Prediction<'m, C> {
    /// Start a session scoring the first `label_count` outputs of `model`,
    /// with a top-k histogram `top_k_depth` deep.
    pub fn new(model: &'m mut Model, clock: &'m C, label_count: usize, top_k_depth: usize) -> NanoResult<Self> {
        if label_count == 0 || label_count > model.output().len() {
            return Err(NanoError::InvalidArgument("label count must be within the model output"));
        }
        if top_k_depth == 0 {
            return Err(NanoError::InvalidArgument("top-k depth must be non-zero"));
        }
        let cells = label_count
            .checked_mul(label_count)
            .ok_or(NanoError::AllocationFailed)?;
        Ok(Self {
            model,
            clock,
            label_count,
            top_k: counters(top_k_depth)?,
            confusion: counters(cells)?,
            frames: 0,
            run_time_us: 0,
            started_us: clock.now_us(),
            total_time_us: None,
        })
    }

    pub fn model(&self) -> &Model {
        &*self.model
    }

    /// Access to the model, e.g. to fill its input buffer between runs.
    pub fn model_mut(&mut self) -> &mut Model {
        &mut *self.model
    }

    /// Run the model on its current input and score the result against
    /// `true_label`. Returns the top-1 prediction.
    pub fn run(&mut self, true_label: usize) -> NanoResult<usize> {
        if true_label >= self.label_count {
            return Err(NanoError::InvalidArgument("label out of range"));
        }
        let t0 = self.clock.now_us();
        self.model.run(self.clock)?;
        self.run_time_us += self.clock.now_us().saturating_sub(t0);

        let scores = &self.model.output()[..self.label_count];
        let rank = rank_of(scores, true_label).ok_or(NanoError::InvalidArgument("label out of range"))?;
        if let Some(bucket) = self.top_k.get_mut(rank) {
            *bucket += 1;
        }
        let predicted = argmax_i8(scores).ok_or(NanoError::InvalidArgument("empty model output"))?;
        self.confusion[true_label * self.label_count + predicted] += 1;
        self.frames += 1;
        Ok(predicted)
    }

    /// Copy `input` into the model and [`run`](Self::run) it.
    pub fn run_sample(&mut self, input: &[i8], true_label: usize) -> NanoResult<usize> {
        self.model.set_input(input)?;
        self.run(true_label)
    }

    /// Stamp the total session time.
    pub fn finish(&mut self) {
        let total = self.clock.now_us().saturating_sub(self.started_us);
        self.total_time_us = Some(total);
        info!("prediction session finished: {} frames in {}us", self.frames, total);
    }

    pub fn report(&self) -> PredictionReport {
        PredictionReport {
            frames: self.frames,
            label_count: self.label_count,
            top_k: self.top_k.clone(),
            confusion: self.confusion.clone(),
            total_time_us: self
                .total_time_us
                .unwrap_or_else(|| self.clock.now_us().saturating_sub(self.started_us)),
            run_time_us: self.run_time_us,
            total_ops: self.model.total_ops(),
        }
    }

    pub fn log_summary(&self) {
        let report = self.report();
        for line in alloc::format!("{}", report).lines() {
            info!("{}", line);
        }
    }
}

fn counters(len: usize) -> NanoResult<Vec<u32>> {
    let mut v = Vec::new();
    v.try_reserve_exact(len).map_err(|_| NanoError::AllocationFailed)?;
    v.resize(len, 0);
    Ok(v)
}

/// Snapshot of a session's counters.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PredictionReport {
    pub frames: u32,
    pub label_count: usize,
    /// `top_k[r]` counts predictions whose true label had rank `r`.
    pub top_k: Vec<u32>,
    /// Row-major `[actual][predicted]`.
    pub confusion: Vec<u32>,
    pub total_time_us: u64,
    pub run_time_us: u64,
    /// MACs of one model run.
    pub total_ops: u64,
}

impl PredictionReport {
    /// Cumulative hits at ranks `0..k`.
    pub fn top_k_hits(&self, k: usize) -> u32 {
        self.top_k.iter().take(k).sum()
    }

    /// Fraction of frames whose true label ranked within the first `k`.
    pub fn top_k_accuracy(&self, k: usize) -> Option<f64> {
        ratio(self.top_k_hits(k) as u64, self.frames as u64)
    }

    pub fn confusion(&self, actual: usize, predicted: usize) -> u32 {
        if actual >= self.label_count || predicted >= self.label_count {
            return 0;
        }
        self.confusion[actual * self.label_count + predicted]
    }

    pub fn row_total(&self, actual: usize) -> u32 {
        (0..self.label_count).map(|p| self.confusion(actual, p)).sum()
    }

    /// Share of `actual`'s frames predicted correctly.
    pub fn row_accuracy(&self, actual: usize) -> Option<f64> {
        ratio(self.confusion(actual, actual) as u64, self.row_total(actual) as u64)
    }

    pub fn average_latency_us(&self) -> Option<f64> {
        ratio(self.run_time_us, self.frames as u64)
    }

    /// Average MACs per microsecond of model run time.
    pub fn efficiency(&self) -> Option<f64> {
        ops_per_us(self.total_ops.saturating_mul(self.frames as u64), self.run_time_us)
    }

    pub fn frame_rate_hz(&self) -> Option<f64> {
        ratio(self.frames as u64 * 1_000_000, self.run_time_us)
    }
}

fn ratio(num: u64, den: u64) -> Option<f64> {
    if den == 0 {
        None
    } else {
        Some(num as f64 / den as f64)
    }
}

/// Percentage truncated to hundredths, exact 100% printed without decimals.
struct Percent {
    num: u64,
    den: u64,
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den == 0 {
            return f.write_str("n/a");
        }
        if self.num == self.den {
            return f.write_str("100%");
        }
        let hundredths = self.num * 10_000 / self.den;
        write!(f, "{}.{:02}%", hundredths / 100, hundredths % 100)
    }
}

impl fmt::Display for PredictionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Prediction summary:")?;
        writeln!(f, "Test frames: {}", self.frames)?;
        writeln!(f, "Test running time: {}us", self.total_time_us)?;
        writeln!(f, "Model running time: {}us", self.run_time_us)?;
        writeln!(f, "Average prediction time: {}us", Ratio(self.average_latency_us()))?;
        writeln!(f, "Average efficiency: {} ops/us", Ratio(self.efficiency()))?;
        writeln!(f, "Average frame rate: {}Hz", Ratio(self.frame_rate_hz()))?;
        for k in 1..=self.top_k.len() {
            let hits = Percent { num: self.top_k_hits(k) as u64, den: self.frames as u64 };
            writeln!(f, "Top {} Accuracy: {}", k, hits)?;
        }

        writeln!(f)?;
        writeln!(f, "Confusion matrix:")?;
        write!(f, "predic")?;
        for p in 0..self.label_count {
            write!(f, "{:>6}", p)?;
        }
        writeln!(f)?;
        writeln!(f, "actual")?;
        for a in 0..self.label_count {
            write!(f, " {:>3} |", a)?;
            for p in 0..self.label_count {
                write!(f, "{:>6}", self.confusion(a, p))?;
            }
            let row = Percent { num: self.confusion(a, a) as u64, den: self.row_total(a) as u64 };
            writeln!(f, "   | {}", row)?;
        }
        Ok(())
    }
}
