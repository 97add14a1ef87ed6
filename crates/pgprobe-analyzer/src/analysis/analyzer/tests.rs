//! Tests for the Explain Analyzer

use super::*;
use crate::explain::NodeType;
use pgprobe_core::ProbeError;
use pretty_assertions::assert_eq;
use serde_json::json;

fn assert_sorted(bottlenecks: &[Bottleneck]) {
    for pair in bottlenecks.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        assert!(a.severity.rank() <= b.severity.rank(), "severity out of order");
        if a.severity == b.severity {
            assert!(
                a.cost.unwrap_or(0.0) >= b.cost.unwrap_or(0.0),
                "cost out of order within {}",
                a.severity
            );
        }
    }
}

mod scenario_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_filtered_seq_scan_on_orders() {
        let explain = json!([{
            "Plan": {
                "Node Type": "Seq Scan",
                "Relation Name": "orders",
                "Alias": "orders",
                "Startup Cost": 0.00,
                "Total Cost": 55072.45,
                "Plan Rows": 98000,
                "Actual Rows": 100000,
                "Filter": "(o_custkey = 123) AND (o_orderstatus = 'F')"
            }
        }]);

        let result = ExplainAnalyzer::new().analyze(&explain).unwrap();

        assert_eq!(result.total_cost, 55072.45);
        assert_eq!(result.bottlenecks.len(), 1);
        let bottleneck = &result.bottlenecks[0];
        assert_eq!(bottleneck.severity, Severity::High);
        assert_eq!(
            bottleneck.suggestion,
            "CREATE INDEX idx_orders_composite ON orders(o_custkey, o_orderstatus);"
        );
        assert_eq!(result.optimization_priority, Severity::High);
    }

    #[test]
    fn test_cheap_index_scan() {
        let explain = json!({
            "Plan": {
                "Node Type": "Index Scan",
                "Relation Name": "orders",
                "Index Name": "orders_pkey",
                "Total Cost": 14.2,
                "Plan Rows": 1
            }
        });

        let result = ExplainAnalyzer::new().analyze(&explain).unwrap();

        assert!(result.bottlenecks.is_empty());
        assert!(!result.has_bottlenecks());
        assert_eq!(result.optimization_priority, Severity::Low);
        assert!(result.summary.contains("No significant bottlenecks"));
    }
}

mod structure_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_missing_plan_key_is_an_error() {
        let err = ExplainAnalyzer::new()
            .analyze(&json!([{"Planning Time": 0.1}]))
            .unwrap_err();
        assert!(matches!(err, ProbeError::MalformedPlanInput(_)));
    }

    #[test]
    fn test_text_and_value_inputs_agree() {
        let text = r#"{"Plan": {"Node Type": "Seq Scan", "Relation Name": "t", "Plan Rows": 20000, "Total Cost": 300.0}}"#;
        let value: serde_json::Value = serde_json::from_str(text).unwrap();
        let analyzer = ExplainAnalyzer::new();

        assert_eq!(
            analyzer.analyze_str(text).unwrap(),
            analyzer.analyze(&value).unwrap()
        );
    }

    #[test]
    fn test_timings_are_carried_over() {
        let explain = json!([{
            "Plan": {"Node Type": "Result", "Total Cost": 0.01},
            "Planning Time": 0.05,
            "Execution Time": 0.02
        }]);
        let result = ExplainAnalyzer::new().analyze(&explain).unwrap();
        assert_eq!(result.planning_time_ms, Some(0.05));
        assert_eq!(result.execution_time_ms, Some(0.02));
    }

    #[test]
    fn test_gather_is_transparent() {
        let explain = json!({
            "Plan": {
                "Node Type": "Gather",
                "Total Cost": 1000.0,
                "Plans": [{
                    "Node Type": "Seq Scan",
                    "Relation Name": "events",
                    "Total Cost": 900.0,
                    "Plan Rows": 30000
                }]
            }
        });

        let result = ExplainAnalyzer::new().analyze(&explain).unwrap();

        assert!(result.bottlenecks.iter().all(|b| b.node_type != "Gather"));
        assert!(
            result
                .bottlenecks
                .iter()
                .any(|b| b.node_type == "Seq Scan" && b.severity == Severity::High)
        );
    }

    #[test]
    fn test_gather_root_does_not_shield_children_from_cost_rule() {
        let explain = json!({
            "Plan": {
                "Node Type": "Gather Merge",
                "Total Cost": 1000.0,
                "Plans": [{
                    "Node Type": "Sort",
                    "Total Cost": 950.0,
                    "Sort Key": ["id"],
                    "Plans": [{"Node Type": "Seq Scan", "Relation Name": "t", "Total Cost": 100.0, "Plan Rows": 10}]
                }]
            }
        });

        let result = ExplainAnalyzer::new().analyze(&explain).unwrap();
        let sort_findings: Vec<_> = result
            .bottlenecks
            .iter()
            .filter(|b| b.node_type == "Sort")
            .collect();
        assert_eq!(sort_findings.len(), 1);
        assert_eq!(sort_findings[0].cost_percentage, Some(95.0));
    }
}

mod ranking_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn limit_sort_scan() -> serde_json::Value {
        json!([{
            "Plan": {
                "Node Type": "Limit",
                "Total Cost": 1000.0,
                "Plans": [{
                    "Node Type": "Sort",
                    "Total Cost": 900.0,
                    "Sort Key": ["o.created_at DESC"],
                    "Sort Method": "external merge",
                    "Plans": [{
                        "Node Type": "Seq Scan",
                        "Relation Name": "orders",
                        "Alias": "o",
                        "Total Cost": 500.0,
                        "Plan Rows": 50000
                    }]
                }]
            }
        }])
    }

    #[test]
    fn test_bottlenecks_are_ranked() {
        let result = ExplainAnalyzer::new().analyze(&limit_sort_scan()).unwrap();

        let ranked: Vec<(&str, Severity)> = result
            .bottlenecks
            .iter()
            .map(|b| (b.node_type.as_str(), b.severity))
            .collect();
        assert_eq!(
            ranked,
            vec![
                ("Sort", Severity::High),
                ("Seq Scan", Severity::High),
                ("Sort", Severity::Medium),
            ]
        );
        assert_sorted(&result.bottlenecks);
        assert_eq!(result.optimization_priority, Severity::High);
        assert!(result.summary.contains("3 bottleneck(s)"));
    }

    #[test]
    fn test_analysis_is_idempotent() {
        let analyzer = ExplainAnalyzer::new();
        let plan = limit_sort_scan();
        assert_eq!(
            analyzer.analyze(&plan).unwrap(),
            analyzer.analyze(&plan).unwrap()
        );
    }

    #[test]
    fn test_priority_follows_most_severe_finding() {
        let low = Bottleneck::new("Seq Scan", Severity::Low, "r", "s");
        let medium = Bottleneck::new("Sort", Severity::Medium, "r", "s");
        let high = Bottleneck::new("Sort", Severity::High, "r", "s");

        assert_eq!(optimization_priority(&[]), Severity::Low);
        assert_eq!(optimization_priority(&[low.clone()]), Severity::Low);
        assert_eq!(
            optimization_priority(&[low.clone(), medium.clone()]),
            Severity::Medium
        );
        assert_eq!(optimization_priority(&[medium, low, high]), Severity::High);
    }

    #[test]
    fn test_sort_is_stable_and_treats_missing_cost_as_zero() {
        let mut bottlenecks = vec![
            Bottleneck::new("A", Severity::Medium, "first", "s"),
            Bottleneck::new("B", Severity::Medium, "second", "s").with_cost(Some(5.0)),
            Bottleneck::new("C", Severity::Medium, "third", "s"),
            Bottleneck::new("D", Severity::High, "fourth", "s").with_cost(Some(1.0)),
        ];
        sort_bottlenecks(&mut bottlenecks);

        let order: Vec<_> = bottlenecks.iter().map(|b| b.node_type.as_str()).collect();
        assert_eq!(order, vec!["D", "B", "A", "C"]);
    }
}

mod isolation_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct FailingRule;

    impl DetectionRule for FailingRule {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn check(&self, _node: &PlanNode, _ctx: &RuleContext<'_>) -> Result<Option<Bottleneck>> {
            Err(pgprobe_core::ProbeError::Validation("boom".into()))
        }
    }

    struct EveryNodeRule;

    impl DetectionRule for EveryNodeRule {
        fn name(&self) -> &'static str {
            "every_node"
        }

        fn check(&self, node: &PlanNode, _ctx: &RuleContext<'_>) -> Result<Option<Bottleneck>> {
            Ok(Some(Bottleneck::new(
                node.node_type.as_str(),
                Severity::Low,
                "seen",
                "none",
            )))
        }
    }

    #[test]
    fn test_failing_rule_does_not_suppress_others() {
        let analyzer = ExplainAnalyzer::new()
            .with_rule(FailingRule)
            .with_rule(EveryNodeRule);

        let explain = json!({
            "Plan": {
                "Node Type": "Seq Scan",
                "Relation Name": "big",
                "Plan Rows": 1000000,
                "Total Cost": 20000.0
            }
        });
        let result = analyzer.analyze(&explain).unwrap();

        assert_eq!(result.bottlenecks.len(), 2);
        assert_eq!(result.bottlenecks[0].severity, Severity::High);
        assert_eq!(result.bottlenecks[1].reason, "seen");
    }

    #[test]
    fn test_unparseable_filter_keeps_the_seq_scan_finding() {
        let explain = json!([{
            "Plan": {
                "Node Type": "Seq Scan",
                "Relation Name": "products",
                "Plan Rows": 200000,
                "Total Cost": 4800.0,
                "Filter": "(price)::numeric(10"
            }
        }]);
        let result = ExplainAnalyzer::new().analyze(&explain).unwrap();

        assert_eq!(result.bottlenecks.len(), 1);
        assert_eq!(result.bottlenecks[0].severity, Severity::High);
        assert!(
            result.bottlenecks[0]
                .suggestion
                .starts_with("Consider adding an index on products")
        );
    }

    #[test]
    fn test_custom_rule_skips_gather_nodes() {
        let analyzer = ExplainAnalyzer::new().with_rule(EveryNodeRule);
        let plan = QueryPlan::new(
            PlanNode::new(NodeType::Gather)
                .with_child(PlanNode::new(NodeType::IndexScan).with_relation("t")),
        );

        let result = analyzer.analyze_plan(&plan);
        let seen: Vec<_> = result
            .bottlenecks
            .iter()
            .map(|b| b.node_type.as_str())
            .collect();
        assert_eq!(seen, vec!["Index Scan"]);
    }
}

#[test]
fn test_thresholds_are_used() {
    let analyzer = ExplainAnalyzer::with_thresholds(
        AnalyzerThresholds::default().with_seq_scan_min_rows(1_000_000),
    );
    let explain = json!({"Plan": {"Node Type": "Seq Scan", "Relation Name": "t", "Plan Rows": 20000}});

    assert!(analyzer.analyze(&explain).unwrap().bottlenecks.is_empty());
    assert_eq!(analyzer.thresholds().seq_scan_min_rows, 1_000_000);
}

#[test]
fn test_result_serializes_with_contract_field_names() {
    let explain = json!({
        "Plan": {
            "Node Type": "Seq Scan",
            "Relation Name": "orders",
            "Total Cost": 2000.0,
            "Plan Rows": 20000
        }
    });
    let result = ExplainAnalyzer::new().analyze(&explain).unwrap();
    let value = serde_json::to_value(&result).unwrap();

    assert_eq!(value["optimization_priority"], json!("HIGH"));
    assert_eq!(value["bottlenecks"][0]["severity"], json!("HIGH"));
    assert_eq!(value["bottlenecks"][0]["node_type"], json!("Seq Scan"));
    assert_eq!(value["bottlenecks"][0]["table"], json!("orders"));
    assert_eq!(value["bottlenecks"][0]["cost_percentage"], json!(100.0));
    assert!(value.get("execution_time_ms").is_none());
    assert!(value["summary"].is_string());
}
