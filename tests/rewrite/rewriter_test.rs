#[cfg(test)]
mod tests {
    use strata::{
        AggregateFunction, ContextRewriter, Dimension, DimensionKind, EntityGraph, Metric,
        MetricKind, Model, SemanticError,
    };

    fn orders_graph() -> EntityGraph {
        let mut graph = EntityGraph::new();
        graph
            .add_model(
                Model::new("orders")
                    .with_table("orders")
                    .with_dimension(Dimension::new("region", DimensionKind::Categorical))
                    .with_dimension(Dimension::new("status", DimensionKind::Categorical))
                    .with_dimension(Dimension::new("year", DimensionKind::Numeric))
                    .with_metric(
                        Metric::simple("revenue", AggregateFunction::Sum).with_expr("amount"),
                    )
                    .with_metric(Metric::simple("order_count", AggregateFunction::Count))
                    .with_metric(Metric {
                        name: "running_revenue".to_string(),
                        kind: MetricKind::Cumulative {
                            measure: "orders.revenue".to_string(),
                            window: None,
                        },
                        filters: vec![],
                        fill_nulls_with: None,
                    })
                    .with_metric(Metric {
                        name: "margin_pct".to_string(),
                        kind: MetricKind::Derived {
                            expr: "revenue - order_count".to_string(),
                        },
                        filters: vec![],
                        fill_nulls_with: None,
                    }),
            )
            .unwrap();
        graph
    }

    #[test]
    fn test_plain_sql_is_untouched() {
        let graph = orders_graph();
        let rewriter = ContextRewriter::new(&graph);
        let sql = "SELECT region, SUM(amount) FROM orders GROUP BY region";
        assert_eq!(rewriter.rewrite(sql).unwrap(), sql);
    }

    #[test]
    fn test_semantic_marker_alone_is_stripped() {
        let graph = orders_graph();
        let rewriter = ContextRewriter::new(&graph);
        let out = rewriter
            .rewrite("SEMANTIC SELECT region FROM orders")
            .unwrap();
        assert_eq!(out, "SELECT region FROM orders");
    }

    #[test]
    fn test_aggregate_requires_semantic_marker() {
        let graph = orders_graph();
        let rewriter = ContextRewriter::new(&graph);
        let err = rewriter.rewrite("SELECT AGGREGATE(revenue) FROM orders");
        assert!(matches!(err, Err(SemanticError::InvalidSyntaxContext(_))));
    }

    #[test]
    fn test_unknown_measure_is_unresolved() {
        let graph = orders_graph();
        let rewriter = ContextRewriter::new(&graph);
        let err = rewriter
            .rewrite("SEMANTIC SELECT region, AGGREGATE(margin) AT (ALL) FROM orders GROUP BY region");
        assert!(matches!(err, Err(SemanticError::UnresolvedField(_))));
    }

    #[test]
    fn test_derived_metric_cannot_be_recomputed() {
        let graph = orders_graph();
        let rewriter = ContextRewriter::new(&graph);
        let err = rewriter.rewrite(
            "SEMANTIC SELECT region, AGGREGATE(margin_pct) AT (ALL) FROM orders GROUP BY region",
        );
        assert!(matches!(
            err,
            Err(SemanticError::UnsupportedAggregateRecomputation(_))
        ));
    }

    #[test]
    fn test_windowed_metric_rejects_widening() {
        let graph = orders_graph();
        let rewriter = ContextRewriter::new(&graph);
        let err = rewriter.rewrite(
            "SEMANTIC SELECT region, AGGREGATE(running_revenue) AT (ALL) FROM orders GROUP BY region",
        );
        assert!(matches!(
            err,
            Err(SemanticError::UnsupportedAggregateRecomputation(_))
        ));
    }

    #[test]
    fn test_windowed_metric_allows_plain_filter() {
        let graph = orders_graph();
        let rewriter = ContextRewriter::new(&graph);
        let out = rewriter
            .rewrite(
                "SEMANTIC SELECT region, AGGREGATE(running_revenue) AT (WHERE status = 'done') \
                 FROM orders GROUP BY region",
            )
            .unwrap();
        // The cumulative window collapses to its base aggregate.
        assert!(out.contains("SELECT SUM(amount) FROM orders AS orders_ctx"));
    }

    #[test]
    fn test_current_of_unknown_dimension_is_ambiguous() {
        let graph = orders_graph();
        let rewriter = ContextRewriter::new(&graph);
        let err = rewriter.rewrite(
            "SEMANTIC SELECT region, AGGREGATE(revenue) AT (SET region = CURRENT warehouse) \
             FROM orders GROUP BY region",
        );
        assert!(matches!(err, Err(SemanticError::AmbiguousContext(_))));
    }

    #[test]
    fn test_unbalanced_at_clause_rejected() {
        let graph = orders_graph();
        let rewriter = ContextRewriter::new(&graph);
        let err =
            rewriter.rewrite("SEMANTIC SELECT AGGREGATE(revenue) AT (ALL FROM orders");
        assert!(matches!(err, Err(SemanticError::InvalidSyntaxContext(_))));
    }

    #[test]
    fn test_qualified_aggregate_call() {
        let graph = orders_graph();
        let rewriter = ContextRewriter::new(&graph);
        let out = rewriter
            .rewrite(
                "SEMANTIC SELECT region, orders.AGGREGATE(revenue) AT (ALL) \
                 FROM orders GROUP BY region",
            )
            .unwrap();
        assert!(out.contains("(SELECT SUM(amount) FROM orders AS orders_ctx)"));
    }

    #[test]
    fn test_placeholder_inside_function_argument() {
        let graph = orders_graph();
        let rewriter = ContextRewriter::new(&graph);
        let out = rewriter
            .rewrite(
                "SEMANTIC SELECT region, ROUND(SUM(amount) * 100.0 / AGGREGATE(revenue) AT (ALL), 2) \
                 FROM orders GROUP BY region",
            )
            .unwrap();
        assert!(out.contains("ROUND(SUM(amount) * 100.0 / (SELECT SUM(amount) FROM orders AS orders_ctx), 2)"));
    }
}
