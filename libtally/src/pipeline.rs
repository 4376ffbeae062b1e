use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{JournalError, Result};
use crate::journal::Day;

pub trait Stage {
    fn process(&mut self, day: Day) -> Result<Vec<Day>>;

    fn finish(&mut self) -> Result<Vec<Day>> {
        Ok(Vec::new())
    }
}

#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> CancellationToken {
        CancellationToken::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(JournalError::Cancelled);
        }
        Ok(())
    }
}

pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
    token: CancellationToken,
}

impl Pipeline {
    pub fn new(token: CancellationToken) -> Pipeline {
        Pipeline {
            stages: Vec::new(),
            token,
        }
    }

    pub fn stage(mut self, stage: impl Stage + 'static) -> Pipeline {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn run(
        &mut self,
        days: impl IntoIterator<Item = Day>,
        mut sink: impl FnMut(Day) -> Result<()>,
    ) -> Result<()> {
        for day in days {
            let batch = self.advance(vec![day], 0)?;
            for day in batch {
                sink(day)?;
            }
        }
        for idx in 0..self.stages.len() {
            self.token.check()?;
            let trailing = self.stages[idx].finish()?;
            let batch = self.advance(trailing, idx + 1)?;
            for day in batch {
                sink(day)?;
            }
        }
        Ok(())
    }

    fn advance(&mut self, mut batch: Vec<Day>, from: usize) -> Result<Vec<Day>> {
        for stage in self.stages[from..].iter_mut() {
            self.token.check()?;
            let mut next = Vec::new();
            for day in batch {
                next.extend(stage.process(day)?);
            }
            batch = next;
            if batch.is_empty() {
                break;
            }
        }
        Ok(batch)
    }
}
