#[cfg(test)]
mod tests {
    use strata::compile::find_matching_preagg;
    use strata::sql::test_utils::validate_sql;
    use strata::{
        AggregateFunction, Dialect, Dimension, DimensionKind, EntityGraph, Metric, Model,
        PreAggregation, QuerySpec, SqlGenerator, TimeGranularity,
    };

    fn orders_model() -> Model {
        Model::new("orders")
            .with_table("orders")
            .with_primary_key("order_id")
            .with_dimension(Dimension::new("region", DimensionKind::Categorical))
            .with_dimension(Dimension::new("status", DimensionKind::Categorical))
            .with_dimension(
                Dimension::new("created_at", DimensionKind::Time)
                    .with_granularity(TimeGranularity::Day),
            )
            .with_metric(Metric::simple("revenue", AggregateFunction::Sum).with_expr("amount"))
            .with_metric(Metric::simple("order_count", AggregateFunction::Count))
            .with_metric(Metric::simple("avg_amount", AggregateFunction::Avg).with_expr("amount"))
            .with_metric(Metric::simple(
                "customer_count",
                AggregateFunction::CountDistinct,
            ))
            .with_pre_aggregation(
                PreAggregation::new("daily")
                    .with_measures(&["revenue", "order_count", "avg_amount"])
                    .with_dimensions(&["region"])
                    .with_time_dimension("created_at", TimeGranularity::Day),
            )
    }

    fn orders_graph() -> EntityGraph {
        let mut graph = EntityGraph::new();
        graph.add_model(orders_model()).unwrap();
        graph
    }

    #[test]
    fn test_exact_grain_reads_stored_values() {
        let graph = orders_graph();
        let model = graph.get_model("orders").unwrap();
        let preagg = find_matching_preagg(
            model,
            &["revenue"],
            &["region"],
            Some(TimeGranularity::Day),
        )
        .unwrap();

        let sql = SqlGenerator::new(&graph)
            .generate_from_preagg(
                &QuerySpec::new()
                    .metric("orders.revenue")
                    .dimension("orders.region")
                    .dimension("orders.created_at__day"),
                "orders",
                preagg,
            )
            .unwrap();

        assert!(sql.contains("FROM orders_preagg_daily"));
        // Stored at exactly the requested shape: no re-aggregation.
        assert!(sql.contains("revenue AS revenue"));
        assert!(sql.contains("created_at__day AS created_at__day"));
        assert!(!sql.contains("GROUP BY"));
        validate_sql(&sql, Dialect::Ansi);
    }

    #[test]
    fn test_coarser_grain_rolls_up() {
        let graph = orders_graph();
        let model = graph.get_model("orders").unwrap();
        let preagg = find_matching_preagg(
            model,
            &["revenue", "order_count"],
            &["region"],
            Some(TimeGranularity::Month),
        )
        .unwrap();

        let sql = SqlGenerator::new(&graph)
            .generate_from_preagg(
                &QuerySpec::new()
                    .metric("orders.revenue")
                    .metric("orders.order_count")
                    .dimension("orders.region")
                    .dimension("orders.created_at__month"),
                "orders",
                preagg,
            )
            .unwrap();

        assert!(sql.contains("DATE_TRUNC('month', created_at__day) AS created_at__month"));
        assert!(sql.contains("SUM(revenue) AS revenue"));
        // Stored counts are partial counts; rolling up sums them.
        assert!(sql.contains("SUM(order_count) AS order_count"));
        assert!(sql.contains("GROUP BY 1, 2"));
        validate_sql(&sql, Dialect::Ansi);
    }

    #[test]
    fn test_avg_reweights_on_rollup() {
        let graph = orders_graph();
        let model = graph.get_model("orders").unwrap();
        let preagg = find_matching_preagg(
            model,
            &["avg_amount"],
            &["region"],
            Some(TimeGranularity::Month),
        )
        .unwrap();

        let sql = SqlGenerator::new(&graph)
            .generate_from_preagg(
                &QuerySpec::new()
                    .metric("orders.avg_amount")
                    .dimension("orders.region")
                    .dimension("orders.created_at__month"),
                "orders",
                preagg,
            )
            .unwrap();

        assert!(sql.contains(
            "SUM(avg_amount * order_count) / NULLIF(SUM(order_count), 0) AS avg_amount"
        ));
        validate_sql(&sql, Dialect::Ansi);
    }

    #[test]
    fn test_count_distinct_not_derivable_unless_stored() {
        let graph = orders_graph();
        let model = graph.get_model("orders").unwrap();
        // customer_count is not among the rollup's measures.
        assert!(find_matching_preagg(
            model,
            &["customer_count"],
            &["region"],
            Some(TimeGranularity::Day),
        )
        .is_none());
    }

    #[test]
    fn test_dimension_subset_allowed_superset_rejected() {
        let graph = orders_graph();
        let model = graph.get_model("orders").unwrap();

        // Subset of stored dims: fine, rolls region away.
        assert!(find_matching_preagg(model, &["revenue"], &[], Some(TimeGranularity::Day)).is_some());

        // status is not stored: no match.
        assert!(find_matching_preagg(
            model,
            &["revenue"],
            &["status"],
            Some(TimeGranularity::Day),
        )
        .is_none());
    }

    #[test]
    fn test_filters_lose_model_qualifier() {
        let graph = orders_graph();
        let model = graph.get_model("orders").unwrap();
        let preagg =
            find_matching_preagg(model, &["revenue"], &["region"], None).unwrap();

        let sql = SqlGenerator::new(&graph)
            .generate_from_preagg(
                &QuerySpec::new()
                    .metric("orders.revenue")
                    .dimension("orders.region")
                    .filter("orders.region = 'emea'"),
                "orders",
                preagg,
            )
            .unwrap();

        assert!(sql.contains("WHERE region = 'emea'"));
        validate_sql(&sql, Dialect::Ansi);
    }
}
