// ABOUTME: Task definition: a named, ordered sequence of steps
// ABOUTME: Step order is fixed once execution starts and never mutated by the engine

use crate::task::step::TaskStep;

/// An ordered sequence of steps executed as one unit of work.
///
/// The executor takes the definition by `&mut` only because a pipeline
/// step's input is consumed exactly once per run; the step list itself is
/// never restructured by the engine.
pub struct TaskDefinition {
    name: String,
    steps: Vec<Box<dyn TaskStep>>,
}

impl TaskDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    pub fn with_step(mut self, step: impl TaskStep + 'static) -> Self {
        self.add_step(step);
        self
    }

    pub fn add_step(&mut self, step: impl TaskStep + 'static) {
        self.steps.push(Box::new(step));
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub(crate) fn steps_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn TaskStep>> {
        self.steps.iter_mut()
    }
}

impl std::fmt::Debug for TaskDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskDefinition")
            .field("name", &self.name)
            .field("steps", &self.steps.len())
            .finish()
    }
}
