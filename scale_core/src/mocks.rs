//! Test and helper sources for scale_core

use scale_traits::{RawReport, ReadError, ReportSource};
use std::collections::VecDeque;
use std::time::Duration;

/// A source that replays a fixed script of read outcomes.
///
/// Once the script is exhausted every read returns `fallback`
/// (`Timeout` unless changed), which looks like a quiet, connected scale.
#[derive(Debug, Clone)]
pub struct ScriptedSource {
    script: VecDeque<Result<RawReport, ReadError>>,
    fallback: ReadError,
    zero_supported: bool,
    zero_requests: u32,
}

impl Default for ScriptedSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self {
            script: VecDeque::new(),
            fallback: ReadError::Timeout,
            zero_supported: false,
            zero_requests: 0,
        }
    }

    pub fn report(mut self, bytes: impl Into<RawReport>) -> Self {
        self.script.push_back(Ok(bytes.into()));
        self
    }

    pub fn error(mut self, err: ReadError) -> Self {
        self.script.push_back(Err(err));
        self
    }

    pub fn errors(mut self, err: ReadError, n: usize) -> Self {
        self.script.extend(std::iter::repeat_n(Err(err), n));
        self
    }

    pub fn then(mut self, fallback: ReadError) -> Self {
        self.fallback = fallback;
        self
    }

    /// Accept `request_zero` instead of reporting it unsupported.
    pub fn with_zero_support(mut self) -> Self {
        self.zero_supported = true;
        self
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }

    pub fn zero_requests(&self) -> u32 {
        self.zero_requests
    }
}

impl ReportSource for ScriptedSource {
    fn read_report(&mut self, _timeout: Duration) -> Result<RawReport, ReadError> {
        self.script
            .pop_front()
            .unwrap_or_else(|| Err(self.fallback.clone()))
    }

    fn request_zero(&mut self) -> Result<(), ReadError> {
        self.zero_requests += 1;
        if self.zero_supported {
            Ok(())
        } else {
            Err(ReadError::Unsupported)
        }
    }
}
