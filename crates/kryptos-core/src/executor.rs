//! Dependency-ordered step execution
//!
//! Fire-and-reconcile scheduling: every step whose dependencies have all
//! succeeded is dispatched immediately, bounded by a concurrency limiter;
//! each completion re-opens the scan for newly runnable steps. A failed step
//! never aborts independent siblings, its dependents are skipped instead of
//! run with missing inputs, and the request deadline marks everything still
//! unfinished as timed out. Results always come back in plan order.

use crate::agents::{AgentError, AgentPool};
use crate::budget::Deadline;
use crate::error::{Error, Result};
use crate::model::{ExecutionPlan, PlanStep, StepResult};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl Status {
    fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Skipped)
    }

    fn is_doomed(self) -> bool {
        matches!(self, Self::Failed | Self::Skipped)
    }
}

/// Runs validated plans against the agent pool
pub struct Executor {
    pool: Arc<AgentPool>,
    max_parallel: usize,
}

impl Executor {
    /// Executor with at most `max_parallel` steps in flight at once.
    #[must_use]
    pub fn new(pool: Arc<AgentPool>, max_parallel: usize) -> Self {
        Self {
            pool,
            max_parallel: max_parallel.max(1),
        }
    }

    /// Run every step of `plan`, whose params must already be resolved.
    ///
    /// Fails only when no step succeeded; partial failure comes back as a
    /// full result set with per-step errors.
    #[instrument(skip_all, fields(steps = plan.steps.len()))]
    pub async fn run(&self, plan: &ExecutionPlan, deadline: Deadline) -> Result<Vec<StepResult>> {
        let steps = &plan.steps;
        if steps.is_empty() {
            return Ok(Vec::new());
        }

        let mut status = vec![Status::Pending; steps.len()];
        let mut slots: Vec<Option<StepResult>> = vec![None; steps.len()];
        let semaphore = Arc::new(Semaphore::new(self.max_parallel));
        let mut tasks: JoinSet<(usize, std::result::Result<Value, AgentError>)> = JoinSet::new();
        let mut running: HashMap<tokio::task::Id, usize> = HashMap::new();

        loop {
            skip_unrunnable(steps, &mut status, &mut slots);
            self.dispatch_ready(steps, &mut status, &semaphore, &mut tasks, &mut running, deadline);

            if status.iter().all(|s| s.is_terminal()) {
                break;
            }

            let joined = tokio::select! {
                joined = tasks.join_next_with_id() => joined,
                () = tokio::time::sleep_until(deadline.instant()) => {
                    mark_timed_out(steps, &mut status, &mut slots);
                    break;
                }
            };

            match joined {
                Some(Ok((id, (index, outcome)))) => {
                    running.remove(&id);
                    record(steps, &mut status, &mut slots, index, outcome);
                }
                Some(Err(join_err)) => {
                    // A step task died without reporting; fail its step so
                    // dependents are skipped rather than stuck.
                    if let Some(index) = running.remove(&join_err.id()) {
                        warn!(step = index, error = %join_err, "step task aborted");
                        status[index] = Status::Failed;
                        slots[index] = Some(failure(steps, index, format!("step task failed: {join_err}")));
                    }
                }
                None => {
                    // Nothing in flight and nothing became ready; the
                    // remaining steps can never run.
                    for (index, state) in status.iter_mut().enumerate() {
                        if !state.is_terminal() {
                            warn!(step = index, "step unreachable, skipping");
                            *state = Status::Skipped;
                            slots[index] =
                                Some(failure(steps, index, "skipped: unreachable step".to_string()));
                        }
                    }
                    break;
                }
            }
        }

        let results: Vec<StepResult> = slots.into_iter().flatten().collect();
        if !results.iter().any(StepResult::succeeded) {
            return Err(Error::AllStepsFailed {
                reasoning: plan.reasoning.clone(),
            });
        }
        Ok(results)
    }

    fn dispatch_ready(
        &self,
        steps: &[PlanStep],
        status: &mut [Status],
        semaphore: &Arc<Semaphore>,
        tasks: &mut JoinSet<(usize, std::result::Result<Value, AgentError>)>,
        running: &mut HashMap<tokio::task::Id, usize>,
        deadline: Deadline,
    ) {
        for (index, step) in steps.iter().enumerate() {
            if status[index] != Status::Pending || !deps_succeeded(&step.depends_on, status) {
                continue;
            }
            status[index] = Status::Running;

            let pool = Arc::clone(&self.pool);
            let semaphore = Arc::clone(semaphore);
            let agent = step.agent.clone();
            let operation = step.operation.clone();
            let params = step.params.clone();

            debug!(step = index, agent = %agent, operation = %operation, "dispatching step");
            let handle = tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("semaphore closed");
                let outcome = pool.execute(&agent, &operation, &params, deadline).await;
                (index, outcome)
            });
            running.insert(handle.id(), index);
        }
    }
}

fn deps_succeeded(deps: &[usize], status: &[Status]) -> bool {
    deps.iter()
        .all(|&dep| status.get(dep) == Some(&Status::Succeeded))
}

// Mark steps whose dependencies can no longer succeed, to fixpoint so skips
// cascade down chains.
fn skip_unrunnable(steps: &[PlanStep], status: &mut [Status], slots: &mut [Option<StepResult>]) {
    loop {
        let mut changed = false;
        for (index, step) in steps.iter().enumerate() {
            if status[index] != Status::Pending {
                continue;
            }
            let doomed = step
                .depends_on
                .iter()
                .find(|&&dep| dep >= status.len() || status[dep].is_doomed());
            if let Some(&dep) = doomed {
                debug!(step = index, dependency = dep, "skipping step");
                status[index] = Status::Skipped;
                slots[index] = Some(failure(
                    steps,
                    index,
                    format!("skipped: step {dep} did not succeed"),
                ));
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
}

fn mark_timed_out(steps: &[PlanStep], status: &mut [Status], slots: &mut [Option<StepResult>]) {
    for (index, state) in status.iter_mut().enumerate() {
        if !state.is_terminal() {
            warn!(step = index, "request deadline exceeded, marking step timed out");
            *state = Status::Failed;
            slots[index] = Some(failure(
                steps,
                index,
                format!("agent {} timed out: request deadline exceeded", steps[index].agent),
            ));
        }
    }
}

fn record(
    steps: &[PlanStep],
    status: &mut [Status],
    slots: &mut [Option<StepResult>],
    index: usize,
    outcome: std::result::Result<Value, AgentError>,
) {
    let step = &steps[index];
    match outcome {
        Ok(output) => {
            debug!(step = index, agent = %step.agent, "step succeeded");
            status[index] = Status::Succeeded;
            slots[index] = Some(StepResult {
                step_index: index,
                agent: step.agent.clone(),
                operation: step.operation.clone(),
                output: Some(output),
                err: None,
            });
        }
        Err(err) => {
            warn!(step = index, agent = %step.agent, error = %err, "step failed");
            status[index] = Status::Failed;
            slots[index] = Some(failure(steps, index, err.to_string()));
        }
    }
}

fn failure(steps: &[PlanStep], index: usize, err: String) -> StepResult {
    StepResult {
        step_index: index,
        agent: steps[index].agent.clone(),
        operation: steps[index].operation.clone(),
        output: None,
        err: Some(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::MockAgent;
    use serde_json::{json, Map};
    use std::time::Duration;

    fn step(agent: &str, operation: &str, depends_on: Vec<usize>) -> PlanStep {
        PlanStep {
            agent: agent.to_string(),
            operation: operation.to_string(),
            params: Map::new(),
            depends_on,
        }
    }

    fn plan(steps: Vec<PlanStep>) -> ExecutionPlan {
        ExecutionPlan {
            reasoning: "test plan".to_string(),
            needs_synthesis: true,
            steps,
        }
    }

    fn executor_with(agent: Arc<MockAgent>, max_parallel: usize) -> Executor {
        let mut pool = AgentPool::new();
        pool.register(agent);
        Executor::new(Arc::new(pool), max_parallel)
    }

    fn deadline() -> Deadline {
        Deadline::after(Duration::from_secs(10))
    }

    #[tokio::test]
    async fn test_empty_plan() {
        let executor = executor_with(Arc::new(MockAgent::named("worker")), 4);
        let results = executor.run(&plan(Vec::new()), deadline()).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_dependent_step_starts_after_completion() {
        let agent = Arc::new(MockAgent::named("worker").with_delay(Duration::from_millis(20)));
        let executor = executor_with(agent.clone(), 4);

        let steps = vec![step("worker", "first", vec![]), step("worker", "second", vec![0])];
        let results = executor.run(&plan(steps), deadline()).await.unwrap();

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(StepResult::succeeded));
        assert_eq!(
            agent.events(),
            vec!["start first", "end first", "start second", "end second"]
        );
    }

    #[tokio::test]
    async fn test_independent_steps_overlap() {
        let agent = Arc::new(MockAgent::named("worker").with_delay(Duration::from_millis(50)));
        let executor = executor_with(agent.clone(), 4);

        let steps = vec![step("worker", "left", vec![]), step("worker", "right", vec![])];
        executor.run(&plan(steps), deadline()).await.unwrap();

        let events = agent.events();
        let second_start = events.iter().position(|e| e == "start right").unwrap();
        let first_end = events.iter().position(|e| e == "end left").unwrap();
        assert!(second_start < first_end, "expected overlapping execution: {events:?}");
    }

    #[tokio::test]
    async fn test_parallelism_is_bounded() {
        let agent = Arc::new(MockAgent::named("worker").with_delay(Duration::from_millis(10)));
        let executor = executor_with(agent.clone(), 1);

        let steps = vec![
            step("worker", "op0", vec![]),
            step("worker", "op1", vec![]),
            step("worker", "op2", vec![]),
        ];
        executor.run(&plan(steps), deadline()).await.unwrap();

        // With one permit every start is immediately followed by its own end.
        let events = agent.events();
        assert_eq!(events.len(), 6);
        for pair in events.chunks(2) {
            let op = pair[0].strip_prefix("start ").unwrap();
            assert_eq!(pair[1], format!("end {op}"));
        }
    }

    #[tokio::test]
    async fn test_results_come_back_in_plan_order() {
        let slow = Arc::new(MockAgent::named("slow").with_delay(Duration::from_millis(60)));
        let fast = Arc::new(MockAgent::named("fast"));
        slow.push_output(json!("slow output"));
        fast.push_output(json!("fast output"));

        let mut pool = AgentPool::new();
        pool.register(slow);
        pool.register(fast);
        let executor = Executor::new(Arc::new(pool), 4);

        let steps = vec![step("slow", "op", vec![]), step("fast", "op", vec![])];
        let results = executor.run(&plan(steps), deadline()).await.unwrap();

        assert_eq!(results[0].step_index, 0);
        assert_eq!(results[0].output, Some(json!("slow output")));
        assert_eq!(results[1].step_index, 1);
        assert_eq!(results[1].output, Some(json!("fast output")));
    }

    #[tokio::test]
    async fn test_failure_spares_independent_sibling() {
        let flaky = Arc::new(MockAgent::named("flaky"));
        flaky.push_error(AgentError::Unreachable {
            agent: "flaky".to_string(),
            reason: "connection refused".to_string(),
        });
        let steady = Arc::new(MockAgent::named("steady"));
        steady.push_output(json!({ "ok": true }));

        let mut pool = AgentPool::new();
        pool.register(flaky);
        pool.register(steady);
        let executor = Executor::new(Arc::new(pool), 4);

        let steps = vec![step("flaky", "op0", vec![]), step("steady", "op1", vec![])];
        let results = executor.run(&plan(steps), deadline()).await.unwrap();

        assert!(!results[0].succeeded());
        assert!(results[0].err.as_deref().unwrap().contains("unreachable"));
        assert!(results[1].succeeded());
    }

    #[tokio::test]
    async fn test_dependents_of_failed_step_are_skipped() {
        let flaky = Arc::new(MockAgent::named("flaky"));
        flaky.push_error(AgentError::Rejected {
            agent: "flaky".to_string(),
            operation: "op0".to_string(),
            reason: "bad params".to_string(),
        });
        let steady = Arc::new(MockAgent::named("steady"));

        let mut pool = AgentPool::new();
        pool.register(flaky);
        pool.register(steady.clone());
        let executor = Executor::new(Arc::new(pool), 4);

        // 0 fails; 1 and its dependent 2 must be skipped; 3 is independent.
        let steps = vec![
            step("flaky", "op0", vec![]),
            step("steady", "op1", vec![0]),
            step("steady", "op2", vec![1]),
            step("steady", "op3", vec![]),
        ];
        let results = executor.run(&plan(steps), deadline()).await.unwrap();

        assert!(!results[0].succeeded());
        assert_eq!(results[1].err.as_deref(), Some("skipped: step 0 did not succeed"));
        assert_eq!(results[2].err.as_deref(), Some("skipped: step 1 did not succeed"));
        assert!(results[3].succeeded());
        // The skipped steps never reached their agent.
        assert_eq!(steady.call_count(), 1);
    }

    #[tokio::test]
    async fn test_all_steps_failed_is_hard_error() {
        let agent = Arc::new(MockAgent::named("worker"));
        agent.push_error(AgentError::Timeout {
            agent: "worker".to_string(),
            timeout_ms: 5,
        });
        let executor = executor_with(agent, 4);

        let err = executor
            .run(&plan(vec![step("worker", "op", vec![])]), deadline())
            .await
            .unwrap_err();
        match err {
            Error::AllStepsFailed { reasoning } => assert_eq!(reasoning, "test plan"),
            other => panic!("expected AllStepsFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_deadline_marks_unfinished_steps() {
        let agent = Arc::new(MockAgent::named("worker").with_delay(Duration::from_secs(30)));
        let fast = Arc::new(MockAgent::named("quick"));
        fast.push_output(json!("done"));

        let mut pool = AgentPool::new();
        pool.register(agent);
        pool.register(fast);
        let executor = Executor::new(Arc::new(pool), 4);

        let steps = vec![step("quick", "op", vec![]), step("worker", "op", vec![])];
        let tight = Deadline::after(Duration::from_millis(100));
        let results = executor.run(&plan(steps), tight).await.unwrap();

        assert!(results[0].succeeded());
        assert!(results[1].err.as_deref().unwrap().contains("timed out"));
    }
}
