// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-item fault reporting for batch operations.
//!
//! Batches (overlap detection, tile clipping) never abort on a single bad
//! item. Each failure is wrapped in a [`Fault`] and handed to a
//! [`FaultReporter`] chosen by the caller.

use std::sync::Mutex;

use crate::element::ElementId;
use crate::error::Error;

/// A recoverable failure tied to one item of a batch
#[derive(Debug, Clone, PartialEq)]
pub struct Fault {
    pub error: Error,
    /// Offending map element, if the batch works on elements
    pub element: Option<ElementId>,
    /// Position of the offending item in the batch input, if any
    pub item: Option<usize>,
}

impl Fault {
    pub fn for_element(error: Error, element: ElementId) -> Self {
        Self {
            error,
            element: Some(element),
            item: None,
        }
    }

    pub fn for_item(error: Error, item: usize) -> Self {
        Self {
            error,
            element: None,
            item: Some(item),
        }
    }
}

/// Sink for batch failures. Called from worker threads.
pub trait FaultReporter: Send + Sync {
    fn report(&self, fault: &Fault);
}

/// Logs every fault at warn level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingFaultReporter;

impl FaultReporter for TracingFaultReporter {
    fn report(&self, fault: &Fault) {
        match (fault.element, fault.item) {
            (Some(element), _) => {
                tracing::warn!(element = element.0, error = %fault.error, "skipping map element")
            }
            (None, Some(item)) => tracing::warn!(item, error = %fault.error, "skipping batch item"),
            (None, None) => tracing::warn!(error = %fault.error, "skipping batch item"),
        }
    }
}

/// Keeps every fault for later inspection
#[derive(Debug, Default)]
pub struct CollectingFaultReporter {
    faults: Mutex<Vec<Fault>>,
}

impl CollectingFaultReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the faults reported so far
    pub fn faults(&self) -> Vec<Fault> {
        self.faults.lock().map(|f| f.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.faults.lock().map(|f| f.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FaultReporter for CollectingFaultReporter {
    fn report(&self, fault: &Fault) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.push(fault.clone());
        }
    }
}

/// Discards faults; callers still see them in the batch report
#[derive(Debug, Default, Clone, Copy)]
pub struct NullFaultReporter;

impl FaultReporter for NullFaultReporter {
    fn report(&self, _fault: &Fault) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collecting_reporter() {
        let reporter = CollectingFaultReporter::new();
        assert!(reporter.is_empty());

        reporter.report(&Fault::for_element(
            Error::DegenerateGeometry("zero area".into()),
            ElementId(4),
        ));
        reporter.report(&Fault::for_item(Error::DegenerateGeometry("flat".into()), 2));

        let faults = reporter.faults();
        assert_eq!(faults.len(), 2);
        assert_eq!(faults[0].element, Some(ElementId(4)));
        assert_eq!(faults[1].item, Some(2));
    }

    #[test]
    fn test_reporters_are_object_safe() {
        let reporters: Vec<Box<dyn FaultReporter>> = vec![
            Box::new(TracingFaultReporter),
            Box::new(NullFaultReporter),
            Box::new(CollectingFaultReporter::new()),
        ];
        let fault = Fault::for_item(Error::DegenerateGeometry("test".into()), 0);
        for reporter in &reporters {
            reporter.report(&fault);
        }
    }
}
