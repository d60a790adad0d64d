use tokio::task::{AbortHandle, JoinError, JoinSet};
use tracing::{error, info, warn};

use crate::domain::{JobRequest, JobResult};
use crate::error::RuleError;
use crate::rule::RuleRegistry;

/// Evaluates every rule against a request and runs the matching ones
/// concurrently, one task per rule.
pub struct Dispatcher {
    registry: RuleRegistry,
}

impl Dispatcher {
    pub fn new(registry: RuleRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    /// Run every rule whose precondition holds for `request`.
    ///
    /// Returns one `JobResult` per matching rule, in completion order. An
    /// empty vector means no rule applied. Failures stay inside their own
    /// result and never affect sibling rules.
    pub async fn dispatch(&self, request: &JobRequest) -> Vec<JobResult> {
        dispatch(&self.registry, request).await
    }
}

/// Result of one rule task within the JoinSet.
struct RuleCompletion {
    name: &'static str,
    result: Result<JobResult, JoinError>,
}

/// Aborts the inner rule task when its wrapper is dropped.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Free-function form of [`Dispatcher::dispatch`].
pub async fn dispatch(registry: &RuleRegistry, request: &JobRequest) -> Vec<JobResult> {
    let mut join_set: JoinSet<RuleCompletion> = JoinSet::new();

    for rule in registry.rules() {
        if !rule.matches(request) {
            continue;
        }
        let rule = rule.clone();
        let name = rule.name();
        // Each task owns its copy of the request.
        let req = request.clone();
        info!(rule = name, "dispatching rule");
        join_set.spawn(async move {
            // Inner task so a panicking rule still yields a completion.
            let handle = tokio::spawn(async move { rule.execute(req).await });
            let _guard = AbortOnDrop(handle.abort_handle());
            let result = handle.await;
            RuleCompletion { name, result }
        });
    }

    let mut results = Vec::with_capacity(join_set.len());
    while let Some(joined) = join_set.join_next().await {
        let completion = match joined {
            Ok(c) => c,
            Err(e) => {
                // The wrapper itself never panics; only runtime shutdown lands here.
                error!(error = %e, "rule wrapper task lost");
                continue;
            }
        };
        match completion.result {
            Ok(jr) => {
                match &jr.error {
                    None => info!(rule = completion.name, "rule completed"),
                    Some(e) => warn!(rule = completion.name, error = %e, "rule failed"),
                }
                results.push(jr);
            }
            Err(e) => {
                error!(rule = completion.name, error = %e, "rule task aborted");
                results.push(JobResult::from_outcome(
                    completion.name,
                    request.clone(),
                    Err(RuleError::Aborted {
                        rule: completion.name.to_string(),
                        reason: e.to_string(),
                    }),
                ));
            }
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Location;
    use crate::rule::{Rule, Trade};
    use crate::test_support::{department, item, location};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Configurable rule: matches on department name, optionally sleeps,
    /// mutates its copy, fails or panics.
    struct ScriptedRule {
        name: &'static str,
        department: &'static str,
        delay: Duration,
        fail: bool,
        panic: bool,
        executions: AtomicUsize,
        seen: Mutex<Vec<JobRequest>>,
    }

    impl ScriptedRule {
        fn new(name: &'static str, department: &'static str) -> Self {
            Self {
                name,
                department,
                delay: Duration::ZERO,
                fail: false,
                panic: false,
                executions: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn with_delay(mut self, ms: u64) -> Self {
            self.delay = Duration::from_millis(ms);
            self
        }

        fn failing(mut self) -> Self {
            self.fail = true;
            self
        }

        fn panicking(mut self) -> Self {
            self.panic = true;
            self
        }
    }

    #[async_trait]
    impl Rule for ScriptedRule {
        fn name(&self) -> &'static str {
            self.name
        }

        fn trade(&self) -> Trade {
            Trade::Engineering
        }

        fn matches(&self, request: &JobRequest) -> bool {
            request.department_name() == Some(self.department)
        }

        async fn execute(&self, mut request: JobRequest) -> JobResult {
            self.executions.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.panic {
                panic!("scripted rule exploded");
            }
            self.seen.lock().unwrap().push(request.clone());
            // Scribble on our own copy.
            request.locations.push(location(999, "Room", None));
            if let Some(d) = request.department.as_mut() {
                d.name = format!("mutated by {}", self.name);
            }
            let outcome = if self.fail {
                Err(RuleError::NoLocations)
            } else {
                Ok(serde_json::json!({ "by": self.name }))
            };
            JobResult::from_outcome(self.name, request, outcome)
        }
    }

    fn request(dept: &str) -> JobRequest {
        JobRequest {
            department: Some(department(1, dept)),
            job_item: Some(item(2, "TV")),
            locations: vec![location(3, "Room", None)],
        }
    }

    fn registry(rules: Vec<Arc<ScriptedRule>>) -> RuleRegistry {
        RuleRegistry::from_rules(rules.into_iter().map(|r| r as Arc<dyn Rule>).collect())
    }

    #[tokio::test]
    async fn result_count_equals_matching_rule_count() {
        let rules = vec![
            Arc::new(ScriptedRule::new("a", "Engineering")),
            Arc::new(ScriptedRule::new("b", "Engineering")),
            Arc::new(ScriptedRule::new("c", "Housekeeping")),
        ];
        let reg = registry(rules.clone());

        let results = dispatch(&reg, &request("Engineering")).await;
        assert_eq!(results.len(), 2);
        let mut names: Vec<&str> = results.iter().map(|r| r.rule.as_str()).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(rules[2].executions.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn no_match_returns_empty() {
        let reg = registry(vec![Arc::new(ScriptedRule::new("a", "Engineering"))]);
        assert!(dispatch(&reg, &request("Room Service")).await.is_empty());
        assert!(dispatch(&RuleRegistry::new(), &request("Engineering")).await.is_empty());
    }

    #[tokio::test]
    async fn every_rule_publishes_exactly_once() {
        let rules: Vec<Arc<ScriptedRule>> = (0..16)
            .map(|i| Arc::new(ScriptedRule::new("batch", "Engineering").with_delay(16 - i)))
            .collect();
        let reg = registry(rules.clone());

        let results = dispatch(&reg, &request("Engineering")).await;
        assert_eq!(results.len(), 16);
        for r in &rules {
            assert_eq!(r.executions.load(Ordering::SeqCst), 1);
        }
    }

    #[tokio::test]
    async fn results_arrive_in_completion_order() {
        let reg = registry(vec![
            Arc::new(ScriptedRule::new("slow", "Engineering").with_delay(200)),
            Arc::new(ScriptedRule::new("fast", "Engineering")),
        ]);
        let results = dispatch(&reg, &request("Engineering")).await;
        let names: Vec<&str> = results.iter().map(|r| r.rule.as_str()).collect();
        assert_eq!(names, vec!["fast", "slow"]);
    }

    #[tokio::test]
    async fn failure_does_not_affect_siblings() {
        let reg = registry(vec![
            Arc::new(ScriptedRule::new("ok", "Engineering")),
            Arc::new(ScriptedRule::new("bad", "Engineering").failing()),
        ]);
        let results = dispatch(&reg, &request("Engineering")).await;
        assert_eq!(results.len(), 2);

        let ok = results.iter().find(|r| r.rule == "ok").unwrap();
        assert_eq!(ok.result, Some(serde_json::json!({ "by": "ok" })));
        assert!(ok.error.is_none());

        let bad = results.iter().find(|r| r.rule == "bad").unwrap();
        assert_eq!(bad.error, Some(RuleError::NoLocations));
        assert!(bad.result.is_none());
    }

    #[tokio::test]
    async fn panicking_rule_still_publishes() {
        let reg = registry(vec![
            Arc::new(ScriptedRule::new("ok", "Engineering")),
            Arc::new(ScriptedRule::new("boom", "Engineering").panicking()),
        ]);
        let original = request("Engineering");
        let results = dispatch(&reg, &original).await;
        assert_eq!(results.len(), 2);

        let boom = results.iter().find(|r| r.rule == "boom").unwrap();
        assert!(matches!(boom.error, Some(RuleError::Aborted { .. })));
        assert_eq!(boom.request, original);
    }

    #[tokio::test]
    async fn rules_cannot_observe_each_others_mutations() {
        let rules: Vec<Arc<ScriptedRule>> = vec![
            Arc::new(ScriptedRule::new("first", "Engineering")),
            Arc::new(ScriptedRule::new("second", "Engineering").with_delay(50)),
            Arc::new(ScriptedRule::new("third", "Engineering").with_delay(100)),
        ];
        let reg = registry(rules.clone());
        let original = request("Engineering");
        let snapshot = original.clone();

        let results = dispatch(&reg, &original).await;
        assert_eq!(results.len(), 3);

        // Every rule saw the pristine request.
        for r in &rules {
            assert_eq!(r.seen.lock().unwrap().as_slice(), &[snapshot.clone()]);
        }
        // Each result carries only its own rule's mutation.
        for jr in &results {
            let dept = jr.request.department.as_ref().unwrap();
            assert_eq!(dept.name, format!("mutated by {}", jr.rule));
            let extra: Vec<&Location> =
                jr.request.locations.iter().filter(|l| l.id == 999).collect();
            assert_eq!(extra.len(), 1);
        }
        // The caller's request is untouched.
        assert_eq!(original, snapshot);
    }

    #[tokio::test]
    async fn dropping_dispatch_cancels_running_rules() {
        let slow = Arc::new(ScriptedRule::new("slow", "Engineering").with_delay(100));
        let reg = registry(vec![slow.clone()]);

        let outcome =
            tokio::time::timeout(Duration::from_millis(20), dispatch(&reg, &request("Engineering")))
                .await;
        assert!(outcome.is_err());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(slow.executions.load(Ordering::SeqCst), 1);
        assert!(slow.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn dispatcher_struct_uses_its_registry() {
        let dispatcher = Dispatcher::new(registry(vec![Arc::new(ScriptedRule::new(
            "a",
            "Engineering",
        ))]));
        assert_eq!(dispatcher.registry().len(), 1);
        assert_eq!(dispatcher.dispatch(&request("Engineering")).await.len(), 1);
    }
}
