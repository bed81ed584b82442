#[cfg(test)]
mod tests {
    use strata::sql::test_utils::validate_sql;
    use strata::{
        AggregateFunction, ContextRewriter, Dialect, Dimension, DimensionKind, EntityGraph,
        Metric, Model,
    };

    fn orders_graph() -> EntityGraph {
        let mut graph = EntityGraph::new();
        graph
            .add_model(
                Model::new("orders")
                    .with_table("orders")
                    .with_primary_key("order_id")
                    .with_dimension(Dimension::new("region", DimensionKind::Categorical))
                    .with_dimension(Dimension::new("status", DimensionKind::Categorical))
                    .with_dimension(Dimension::new("year", DimensionKind::Numeric))
                    .with_metric(
                        Metric::simple("revenue", AggregateFunction::Sum).with_expr("amount"),
                    )
                    .with_metric(Metric::simple("order_count", AggregateFunction::Count)),
            )
            .unwrap();
        graph
    }

    fn derived_graph() -> EntityGraph {
        let mut graph = EntityGraph::new();
        graph
            .add_model(
                Model::new("sales")
                    .with_sql("SELECT order_id, amount, region FROM raw_sales")
                    .with_dimension(Dimension::new("region", DimensionKind::Categorical))
                    .with_metric(
                        Metric::simple("revenue", AggregateFunction::Sum).with_expr("amount"),
                    ),
            )
            .unwrap();
        graph
            .add_model(
                Model::new("summary")
                    .with_sql("analytics.rollup_view")
                    .with_metric(
                        Metric::simple("total", AggregateFunction::Sum).with_expr("amount"),
                    ),
            )
            .unwrap();
        graph
    }

    #[test]
    fn test_share_of_total() {
        let graph = orders_graph();
        let rewriter = ContextRewriter::new(&graph);
        let out = rewriter
            .rewrite(
                "SEMANTIC SELECT region, SUM(amount) / AGGREGATE(revenue) AT (ALL) \
                 FROM orders GROUP BY region",
            )
            .unwrap();
        assert!(out.contains("SUM(amount) / (SELECT SUM(amount) FROM orders AS orders_ctx)"));
        validate_sql(&out, Dialect::Ansi);
    }

    #[test]
    fn test_subtotal_correlates_null_safe() {
        let graph = orders_graph();
        let rewriter = ContextRewriter::new(&graph);
        let out = rewriter
            .rewrite(
                "SEMANTIC SELECT region, status, AGGREGATE(revenue) AT (ALL status) \
                 FROM orders GROUP BY region, status",
            )
            .unwrap();
        // region stays tied to the outer row; status is widened away.
        assert!(out.contains("orders_ctx.region IS NOT DISTINCT FROM (orders.region)"));
        assert!(!out.contains("orders_ctx.status IS NOT DISTINCT FROM"));
        validate_sql(&out, Dialect::Ansi);
    }

    #[test]
    fn test_set_shifts_to_prior_year() {
        let graph = orders_graph();
        let rewriter = ContextRewriter::new(&graph);
        let out = rewriter
            .rewrite(
                "SEMANTIC SELECT year, SUM(amount) - AGGREGATE(revenue) AT (SET year = year - 1) \
                 FROM orders GROUP BY year",
            )
            .unwrap();
        // The pinned dimension reads the outer row's value, shifted.
        assert!(out.contains("orders_ctx.year = (orders.year - 1)"));
        validate_sql(&out, Dialect::Ansi);
    }

    #[test]
    fn test_set_in_pins_to_value_list() {
        let graph = orders_graph();
        let rewriter = ContextRewriter::new(&graph);
        let out = rewriter
            .rewrite(
                "SEMANTIC SELECT region, AGGREGATE(revenue) AT (SET region IN ('emea', 'apac')) \
                 FROM orders GROUP BY region",
            )
            .unwrap();
        assert!(out.contains("orders_ctx.region IN ('emea', 'apac')"));
        // Pinned dimensions are never also correlated.
        assert!(!out.contains("orders_ctx.region IS NOT DISTINCT FROM"));
        validate_sql(&out, Dialect::Ansi);
    }

    #[test]
    fn test_chained_at_clauses_fold_in_order() {
        let graph = orders_graph();
        let rewriter = ContextRewriter::new(&graph);
        let out = rewriter
            .rewrite(
                "SEMANTIC SELECT region, status, \
                 AGGREGATE(revenue) AT (ALL status) AT (SET region = 'west') \
                 FROM orders GROUP BY region, status",
            )
            .unwrap();
        assert!(out.contains("orders_ctx.region = ('west')"));
        assert!(!out.contains("IS NOT DISTINCT FROM"));
        validate_sql(&out, Dialect::Ansi);
    }

    #[test]
    fn test_call_in_order_by_is_expanded() {
        let graph = orders_graph();
        let rewriter = ContextRewriter::new(&graph);
        let out = rewriter
            .rewrite(
                "SEMANTIC SELECT region, AGGREGATE(revenue) FROM orders \
                 GROUP BY region ORDER BY AGGREGATE(revenue) AT (ALL)",
            )
            .unwrap();
        assert!(!out.contains("__ctx_agg"));
        assert!(out.contains("ORDER BY (SELECT SUM(amount) FROM orders AS orders_ctx)"));
        validate_sql(&out, Dialect::Ansi);
    }

    #[test]
    fn test_bare_measure_ignores_outer_where_without_visible() {
        let graph = orders_graph();
        let rewriter = ContextRewriter::new(&graph);
        let out = rewriter
            .rewrite(
                "SEMANTIC SELECT region, revenue AT (ALL) \
                 FROM orders WHERE status = 'done' GROUP BY region",
            )
            .unwrap();
        assert!(out.contains("(SELECT SUM(amount) FROM orders AS orders_ctx)"));
        assert!(!out.contains("orders_ctx.status"));
        validate_sql(&out, Dialect::Ansi);
    }

    #[test]
    fn test_visible_copies_outer_where_requalified() {
        let graph = orders_graph();
        let rewriter = ContextRewriter::new(&graph);
        let out = rewriter
            .rewrite(
                "SEMANTIC SELECT region, revenue AT (ALL, VISIBLE) \
                 FROM orders WHERE status = 'done' GROUP BY region",
            )
            .unwrap();
        assert!(out.contains("(orders_ctx.status = 'done')"));
        validate_sql(&out, Dialect::Ansi);
    }

    #[test]
    fn test_visible_without_outer_where_is_identity() {
        let graph = orders_graph();
        let rewriter = ContextRewriter::new(&graph);
        let plain = rewriter
            .rewrite("SEMANTIC SELECT region, AGGREGATE(revenue) FROM orders GROUP BY region")
            .unwrap();
        let visible = rewriter
            .rewrite(
                "SEMANTIC SELECT region, AGGREGATE(revenue) AT (VISIBLE) \
                 FROM orders GROUP BY region",
            )
            .unwrap();
        assert_eq!(plain, visible);
    }

    #[test]
    fn test_where_modifier_addresses_inner_rows() {
        let graph = orders_graph();
        let rewriter = ContextRewriter::new(&graph);
        let out = rewriter
            .rewrite(
                "SEMANTIC SELECT region, AGGREGATE(revenue) AT (WHERE status = 'done') \
                 FROM orders GROUP BY region",
            )
            .unwrap();
        // The predicate filters subquery rows; status is not rewritten to an
        // outer value.
        assert!(out.contains("status = 'done'"));
        assert!(out.contains("orders_ctx.region IS NOT DISTINCT FROM (orders.region)"));
        assert!(!out.contains("NULL"));
        validate_sql(&out, Dialect::Ansi);
    }

    #[test]
    fn test_current_in_where_modifier_reads_outer_row() {
        let graph = orders_graph();
        let rewriter = ContextRewriter::new(&graph);
        let out = rewriter
            .rewrite(
                "SEMANTIC SELECT year, AGGREGATE(revenue) AT (ALL year, WHERE year < CURRENT year) \
                 FROM orders GROUP BY year",
            )
            .unwrap();
        assert!(out.contains("WHERE year < orders.year"));
        validate_sql(&out, Dialect::Ansi);
    }

    #[test]
    fn test_current_of_unresolvable_dimension_yields_null() {
        let graph = orders_graph();
        let rewriter = ContextRewriter::new(&graph);
        let out = rewriter
            .rewrite(
                "SEMANTIC SELECT region, AGGREGATE(revenue) AT (SET status = CURRENT status) \
                 FROM orders GROUP BY region",
            )
            .unwrap();
        // status is neither grouped nor pinned by the outer query, so the
        // whole expansion has no defined value.
        assert!(out.contains("NULL"));
        assert!(!out.contains("orders_ctx"));
        validate_sql(&out, Dialect::Ansi);
    }

    #[test]
    fn test_current_picks_up_where_pinned_literal() {
        let graph = orders_graph();
        let rewriter = ContextRewriter::new(&graph);
        let out = rewriter
            .rewrite(
                "SEMANTIC SELECT region, AGGREGATE(revenue) AT (SET status = CURRENT status) \
                 FROM orders WHERE status = 'done' GROUP BY region",
            )
            .unwrap();
        assert!(out.contains("orders_ctx.status = ('done')"));
        validate_sql(&out, Dialect::Ansi);
    }

    #[test]
    fn test_expression_dimension_correlates_on_single_relation() {
        let graph = orders_graph();
        let rewriter = ContextRewriter::new(&graph);
        let out = rewriter
            .rewrite(
                "SEMANTIC SELECT UPPER(region) AS r, AGGREGATE(revenue) \
                 FROM orders GROUP BY UPPER(region)",
            )
            .unwrap();
        assert!(out.contains(
            "UPPER(orders_ctx.region) IS NOT DISTINCT FROM (UPPER(orders.region))"
        ));
        validate_sql(&out, Dialect::Ansi);
    }

    #[test]
    fn test_expression_dimension_skipped_across_joins() {
        let graph = orders_graph();
        let rewriter = ContextRewriter::new(&graph);
        let out = rewriter
            .rewrite(
                "SEMANTIC SELECT UPPER(o.region) AS r, AGGREGATE(revenue) AT (ALL status) \
                 FROM orders AS o JOIN customers AS c ON o.customer_id = c.id \
                 GROUP BY UPPER(o.region)",
            )
            .unwrap();
        // With more than one relation the expression cannot be requalified
        // safely, so the subquery falls back to an uncorrelated total.
        assert!(!out.contains("IS NOT DISTINCT FROM"));
        validate_sql(&out, Dialect::Ansi);
    }

    #[test]
    fn test_derived_model_wraps_defining_query() {
        let graph = derived_graph();
        let rewriter = ContextRewriter::new(&graph);
        let out = rewriter
            .rewrite("SEMANTIC SELECT AGGREGATE(sales.revenue) AT (ALL) FROM sales")
            .unwrap();
        assert!(out.contains(
            "(SELECT SUM(amount) FROM (SELECT order_id, amount, region FROM raw_sales) AS _inner)"
        ));
        validate_sql(&out, Dialect::Ansi);
    }

    #[test]
    fn test_derived_model_bare_relation_gets_select_star() {
        let graph = derived_graph();
        let rewriter = ContextRewriter::new(&graph);
        let out = rewriter
            .rewrite("SEMANTIC SELECT AGGREGATE(summary.total) AT (ALL) FROM summary")
            .unwrap();
        assert!(out.contains("(SELECT SUM(amount) FROM (SELECT * FROM analytics.rollup_view) AS _inner)"));
        validate_sql(&out, Dialect::Ansi);
    }
}
