//! Validated metric catalog.
//!
//! Built once from definition rows, validated eagerly: duplicate names,
//! dangling input references, inputless metrics, and dependency cycles are
//! all `ConfigurationError`s raised at build time. The orchestrator can
//! therefore assume the input-metric graph is a DAG.

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};

use strata_core::errors::ConfigurationError;
use strata_core::types::metric::MetricDefinition;
use strata_core::{FxHashMap, FxHashSet};

#[derive(Debug)]
pub struct MetricCatalog {
    by_name: FxHashMap<String, MetricDefinition>,
    /// Edges point input -> consumer.
    graph: DiGraph<String, ()>,
    node_of: FxHashMap<String, NodeIndex>,
}

impl MetricCatalog {
    pub fn build(definitions: Vec<MetricDefinition>) -> Result<Self, ConfigurationError> {
        let mut by_name: FxHashMap<String, MetricDefinition> = FxHashMap::default();
        for def in definitions {
            if def.input_metrics.is_empty() && def.input_pipelines.is_empty() {
                return Err(ConfigurationError::NoInputs {
                    metric: def.name.clone(),
                });
            }
            if by_name.contains_key(&def.name) {
                return Err(ConfigurationError::DuplicateMetricName { name: def.name });
            }
            by_name.insert(def.name.clone(), def);
        }

        let mut graph = DiGraph::new();
        let mut node_of = FxHashMap::default();
        for name in by_name.keys() {
            let idx = graph.add_node(name.clone());
            node_of.insert(name.clone(), idx);
        }
        for def in by_name.values() {
            for input in &def.input_metrics {
                let Some(&from) = node_of.get(input) else {
                    return Err(ConfigurationError::UnknownInputMetric {
                        metric: def.name.clone(),
                        input: input.clone(),
                    });
                };
                graph.add_edge(from, node_of[&def.name], ());
            }
        }

        // A strongly connected component with more than one member, or a
        // metric feeding itself, is a dependency cycle.
        for scc in tarjan_scc(&graph) {
            let cyclic = scc.len() > 1
                || (scc.len() == 1 && graph.contains_edge(scc[0], scc[0]));
            if cyclic {
                let mut members: Vec<String> =
                    scc.iter().map(|&idx| graph[idx].clone()).collect();
                members.sort();
                return Err(ConfigurationError::CyclicInputMetrics { members });
            }
        }

        Ok(Self {
            by_name,
            graph,
            node_of,
        })
    }

    pub fn get(&self, name: &str) -> Option<&MetricDefinition> {
        self.by_name.get(name)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Metrics that consume this pipeline's output directly.
    pub fn affected_by_pipeline(&self, pipeline_id: &str) -> Vec<&MetricDefinition> {
        let mut hits: Vec<&MetricDefinition> = self
            .by_name
            .values()
            .filter(|def| {
                def.input_pipelines
                    .iter()
                    .any(|p| p.pipeline_id == pipeline_id)
            })
            .collect();
        hits.sort_by(|a, b| a.name.cmp(&b.name));
        hits
    }

    /// The given metrics plus every transitive consumer, in dependency
    /// order: a metric always appears after all of its inputs that are in
    /// the result.
    pub fn aggregation_order<S: AsRef<str>>(&self, seeds: &[S]) -> Vec<&MetricDefinition> {
        let mut reachable: FxHashSet<NodeIndex> = FxHashSet::default();
        let mut stack: Vec<NodeIndex> = seeds
            .iter()
            .filter_map(|s| self.node_of.get(s.as_ref()).copied())
            .collect();
        while let Some(idx) = stack.pop() {
            if reachable.insert(idx) {
                stack.extend(self.graph.neighbors(idx));
            }
        }

        // The graph was proven acyclic at build time.
        let sorted = toposort(&self.graph, None).unwrap_or_default();
        sorted
            .into_iter()
            .filter(|idx| reachable.contains(idx))
            .filter_map(|idx| self.by_name.get(&self.graph[idx]))
            .collect()
    }

    /// Resolved definitions for a metric's declared inputs. The catalog was
    /// validated, so every reference resolves.
    pub fn inputs_of(&self, def: &MetricDefinition) -> Vec<&MetricDefinition> {
        def.input_metrics
            .iter()
            .filter_map(|name| self.by_name.get(name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::types::metric::{AggregationType, PipelineInput};
    use strata_core::GroupPath;

    fn pipeline_metric(name: &str, pipeline: &str) -> MetricDefinition {
        MetricDefinition {
            id: format!("id-{name}"),
            name: name.to_string(),
            aggregation_type: AggregationType::Sum,
            input_metrics: Vec::new(),
            input_pipelines: vec![PipelineInput {
                pipeline_id: pipeline.to_string(),
                output_column: "value".to_string(),
            }],
            groups: vec![GroupPath::root()],
            version: 1,
        }
    }

    fn derived_metric(name: &str, inputs: &[&str]) -> MetricDefinition {
        MetricDefinition {
            input_metrics: inputs.iter().map(|s| s.to_string()).collect(),
            input_pipelines: Vec::new(),
            ..pipeline_metric(name, "unused")
        }
    }

    #[test]
    fn rejects_cycles() {
        let mut a = derived_metric("a", &["b"]);
        a.input_pipelines = vec![PipelineInput {
            pipeline_id: "p".to_string(),
            output_column: "v".to_string(),
        }];
        let b = derived_metric("b", &["c"]);
        let c = derived_metric("c", &["a"]);

        let err = MetricCatalog::build(vec![a, b, c]).unwrap_err();
        match err {
            ConfigurationError::CyclicInputMetrics { members } => {
                assert_eq!(members, vec!["a", "b", "c"]);
            }
            other => panic!("expected cycle error, got {other}"),
        }
    }

    #[test]
    fn rejects_self_reference() {
        let selfy = derived_metric("a", &["a"]);
        assert!(matches!(
            MetricCatalog::build(vec![selfy]),
            Err(ConfigurationError::CyclicInputMetrics { .. })
        ));
    }

    #[test]
    fn rejects_unknown_input() {
        let orphan = derived_metric("a", &["ghost"]);
        assert!(matches!(
            MetricCatalog::build(vec![orphan]),
            Err(ConfigurationError::UnknownInputMetric { .. })
        ));
    }

    #[test]
    fn rejects_inputless_metric() {
        let empty = derived_metric("a", &[]);
        assert!(matches!(
            MetricCatalog::build(vec![empty]),
            Err(ConfigurationError::NoInputs { .. })
        ));
    }

    #[test]
    fn orders_consumers_after_inputs() {
        let base = pipeline_metric("base", "pipe-1");
        let mid = derived_metric("mid", &["base"]);
        let top = derived_metric("top", &["mid", "base"]);
        let unrelated = pipeline_metric("unrelated", "pipe-2");

        let catalog = MetricCatalog::build(vec![top, unrelated, mid, base]).unwrap();

        let affected = catalog.affected_by_pipeline("pipe-1");
        assert_eq!(affected.len(), 1);
        assert_eq!(affected[0].name, "base");

        let order: Vec<&str> = catalog
            .aggregation_order(&["base"])
            .iter()
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(order, vec!["base", "mid", "top"]);
    }

    #[test]
    fn order_for_unseeded_pipeline_is_empty() {
        let base = pipeline_metric("base", "pipe-1");
        let catalog = MetricCatalog::build(vec![base]).unwrap();
        assert!(catalog.aggregation_order::<&str>(&[]).is_empty());
        assert!(catalog.affected_by_pipeline("pipe-9").is_empty());
    }
}
