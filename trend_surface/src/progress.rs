/////////////////////////////////////////////////////////////////////////////////////////////
//
// Defines progress messages, sinks and cooperative cancellation checkpoints for fitting and grid evaluation.
//
// Created on: 19 Oct 2026     Author: Daniel Owen
//
// Copyright (c) 2026, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! Progress reporting primitives for robust fitting, cross-validation and grid evaluation.

use crate::error::{TrendError, TrendResult};
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;

/// Progress events emitted while a trend surface is fitted and evaluated.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressMsg {
    /// One reweighting pass of the robust fit.
    RobustIteration {
        iter: usize,
        scale: f64,
        relative_change: f64,
    },

    /// A cross-validation fold finished. `progress` is the fraction of folds done.
    CrossValidationFold {
        fold: usize,
        rmse: f64,
        progress: f64,
    },

    /// A grid row finished evaluating. `progress` is the fraction of rows done.
    GridRow { row: usize, progress: f64 },

    /// Arbitrary informational message.
    Message { message: String },
}

/// Sink that consumes progress messages.
///
/// Sinks are polled for cancellation at cooperative checkpoints (once per
/// grid row, once per cross-validation fold). A single least squares solve is
/// never interrupted.
pub trait ProgressSink: Send + Sync + Debug {
    fn emit(&self, msg: ProgressMsg);

    /// Returns `true` once the host wants the running operation abandoned.
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Progress sink that forwards messages over a channel.
#[derive(Debug)]
pub struct ClosureSink {
    tx: mpsc::SyncSender<ProgressMsg>,
    cancelled: Arc<AtomicBool>,
}

impl ClosureSink {
    /// Requests cancellation at the next checkpoint.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}

impl ProgressSink for ClosureSink {
    #[inline]
    fn emit(&self, msg: ProgressMsg) {
        let _ = self.tx.try_send(msg);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Spawns a listener thread that runs a handler closure for each progress message.
///
/// The returned flag cancels the sink's operation at its next checkpoint
/// when set to `true`.
pub fn closure_sink<F>(
    buffer: usize,
    mut handler: F,
) -> (Arc<dyn ProgressSink>, Arc<AtomicBool>, thread::JoinHandle<()>)
where
    F: FnMut(ProgressMsg) + Send + 'static,
{
    let (tx, rx) = mpsc::sync_channel::<ProgressMsg>(buffer.max(1));
    let cancelled = Arc::new(AtomicBool::new(false));
    let sink: Arc<dyn ProgressSink> = Arc::new(ClosureSink {
        tx,
        cancelled: cancelled.clone(),
    });

    let handle = thread::spawn(move || {
        while let Ok(msg) = rx.recv() {
            handler(msg);
        }
    });

    (sink, cancelled, handle)
}

/// Fraction of `total` units completed, clamped to `[0, 1]`.
#[inline]
pub(crate) fn fraction(done: usize, total: usize) -> f64 {
    if total == 0 {
        1.0
    } else {
        (done as f64 / total as f64).min(1.0)
    }
}

/// Emits `msg` to the sink, if any.
#[inline]
pub(crate) fn report(sink: Option<&Arc<dyn ProgressSink>>, msg: impl FnOnce() -> ProgressMsg) {
    if let Some(sink) = sink {
        sink.emit(msg());
    }
}

/// Cooperative cancellation checkpoint.
#[inline]
pub(crate) fn checkpoint(sink: Option<&Arc<dyn ProgressSink>>) -> TrendResult<()> {
    match sink {
        Some(sink) if sink.is_cancelled() => Err(TrendError::Cancelled),
        _ => Ok(()),
    }
}
