use super::{Node, Status, TickContext};
use log::debug;
use rand::Rng;
use std::time::{Duration, Instant};

/// Runs children in order until one fails or is still running.
///
/// Nothing is remembered between calls: every call starts again from the
/// first child.
pub struct Sequence {
    children: Vec<Box<dyn Node>>,
}

impl Sequence {
    pub fn new(children: Vec<Box<dyn Node>>) -> Self {
        Self { children }
    }
}

impl Node for Sequence {
    fn execute(&mut self, ctx: &mut TickContext<'_>) -> Status {
        for child in &mut self.children {
            match child.execute(ctx) {
                Status::Success => continue,
                other => return other,
            }
        }
        Status::Success
    }
}

/// Runs children in order until one succeeds or is still running.
pub struct Selector {
    children: Vec<Box<dyn Node>>,
}

impl Selector {
    pub fn new(children: Vec<Box<dyn Node>>) -> Self {
        Self { children }
    }
}

impl Node for Selector {
    fn execute(&mut self, ctx: &mut TickContext<'_>) -> Status {
        for (i, child) in self.children.iter_mut().enumerate() {
            match child.execute(ctx) {
                Status::Failure => continue,
                other => {
                    debug!("Selector: child {} resolved {:?}", i, other);
                    return other;
                }
            }
        }
        Status::Failure
    }
}

/// Commits to one of two children by a weighted draw and keeps that
/// commitment for at least `redecide_after`.
pub struct Random {
    probability: f32,
    first: Box<dyn Node>,
    second: Box<dyn Node>,
    redecide_after: Duration,
    committed: Option<(bool, Instant)>,
}

impl Random {
    /// `probability` is the chance of committing to `first`.
    pub fn new(
        probability: f32,
        first: Box<dyn Node>,
        second: Box<dyn Node>,
        redecide_after: Duration,
    ) -> Self {
        Self {
            probability,
            first,
            second,
            redecide_after,
            committed: None,
        }
    }
}

impl Node for Random {
    fn execute(&mut self, ctx: &mut TickContext<'_>) -> Status {
        let use_first = match self.committed {
            Some((use_first, at))
                if ctx.now.saturating_duration_since(at) < self.redecide_after =>
            {
                use_first
            }
            _ => {
                let use_first = ctx.rng.gen::<f32>() < self.probability;
                self.committed = Some((use_first, ctx.now));
                use_first
            }
        };

        if use_first {
            self.first.execute(ctx)
        } else {
            self.second.execute(ctx)
        }
    }
}

/// Picks one child at random per resolution, never the same child twice in
/// a row, and sits out a cooldown after every resolved choice.
///
/// While cooling down it reports `Running` without touching any child.
pub struct MutuallyExclusiveSelector {
    children: Vec<Box<dyn Node>>,
    cooldown: Duration,
    last_choice: Option<usize>,
    last_resolved: Option<Instant>,
}

impl MutuallyExclusiveSelector {
    pub fn new(children: Vec<Box<dyn Node>>, cooldown: Duration) -> Self {
        Self {
            children,
            cooldown,
            last_choice: None,
            last_resolved: None,
        }
    }

    pub fn last_choice(&self) -> Option<usize> {
        self.last_choice
    }
}

impl Node for MutuallyExclusiveSelector {
    fn execute(&mut self, ctx: &mut TickContext<'_>) -> Status {
        if self.children.is_empty() {
            return Status::Failure;
        }

        if let Some(at) = self.last_resolved {
            if ctx.now.saturating_duration_since(at) < self.cooldown {
                return Status::Running;
            }
        }

        let len = self.children.len();
        let mut choice = ctx.rng.gen_range(0..len);
        if Some(choice) == self.last_choice && len > 1 {
            choice = (choice + 1) % len;
        }

        let status = self.children[choice].execute(ctx);
        if status != Status::Running {
            debug!("MutuallyExclusiveSelector: child {} resolved {:?}", choice, status);
            self.last_choice = Some(choice);
            self.last_resolved = Some(ctx.now);
        }
        status
    }
}
