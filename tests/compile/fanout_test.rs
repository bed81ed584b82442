#[cfg(test)]
mod tests {
    use strata::sql::test_utils::validate_sql;
    use strata::{
        AggregateFunction, Cardinality, Dialect, Dimension, DimensionKind, EntityGraph, Metric,
        Model, QuerySpec, Relationship, SqlGenerator,
    };

    /// Two fact models (orders, payments) meeting through customers: each
    /// fans the other out at the customer grain.
    fn two_fact_graph() -> EntityGraph {
        let mut graph = EntityGraph::new();
        graph
            .add_model(
                Model::new("orders")
                    .with_table("orders")
                    .with_primary_key("order_id")
                    .with_dimension(Dimension::new("region", DimensionKind::Categorical))
                    .with_metric(
                        Metric::simple("revenue", AggregateFunction::Sum).with_expr("amount"),
                    )
                    .with_relationship(
                        Relationship::new("customers", Cardinality::ManyToOne)
                            .with_foreign_key("customer_id"),
                    ),
            )
            .unwrap();
        graph
            .add_model(
                Model::new("customers")
                    .with_table("customers")
                    .with_primary_key("id")
                    .with_dimension(Dimension::new("segment", DimensionKind::Categorical)),
            )
            .unwrap();
        graph
            .add_model(
                Model::new("payments")
                    .with_table("payments")
                    .with_primary_key("payment_id")
                    .with_metric(
                        Metric::simple("collected", AggregateFunction::Sum)
                            .with_expr("paid_amount"),
                    )
                    .with_metric(Metric::simple(
                        "payer_count",
                        AggregateFunction::CountDistinct,
                    ))
                    .with_relationship(
                        Relationship::new("customers", Cardinality::ManyToOne)
                            .with_foreign_key("customer_id"),
                    ),
            )
            .unwrap();
        graph
    }

    #[test]
    fn test_both_fact_ctes_pre_aggregate() {
        let graph = two_fact_graph();
        let sql = SqlGenerator::new(&graph)
            .generate(
                &QuerySpec::new()
                    .metric("orders.revenue")
                    .metric("payments.collected")
                    .dimension("customers.segment"),
            )
            .unwrap();

        // Each fact CTE folds to join-key grain before the join.
        assert!(sql.contains("SUM(amount) AS revenue_raw"));
        assert!(sql.contains("SUM(paid_amount) AS collected_raw"));
        let orders_cte_start = sql.find("orders_cte AS (").unwrap();
        let orders_cte = &sql[orders_cte_start..sql[orders_cte_start..].find("\n)").unwrap() + orders_cte_start];
        assert!(orders_cte.contains("GROUP BY 1"));

        // The outer query re-folds the folded values.
        assert!(sql.contains("SUM(orders_cte.revenue_raw) AS revenue"));
        assert!(sql.contains("SUM(payments_cte.collected_raw) AS collected"));
        validate_sql(&sql, Dialect::Ansi);
    }

    #[test]
    fn test_single_fact_stays_raw() {
        let graph = two_fact_graph();
        let sql = SqlGenerator::new(&graph)
            .generate(
                &QuerySpec::new()
                    .metric("orders.revenue")
                    .dimension("customers.segment"),
            )
            .unwrap();

        // One measure-bearing model: no fold, raw column carried through.
        assert!(sql.contains("amount AS revenue_raw"));
        assert!(!sql.contains("SUM(amount) AS revenue_raw"));
        validate_sql(&sql, Dialect::Ansi);
    }

    #[test]
    fn test_count_distinct_model_keeps_rows() {
        let graph = two_fact_graph();
        let sql = SqlGenerator::new(&graph)
            .generate(
                &QuerySpec::new()
                    .metric("orders.revenue")
                    .metric("payments.payer_count")
                    .dimension("customers.segment"),
            )
            .unwrap();

        // payments carries a COUNT DISTINCT, so its rows stay raw and the
        // distinct count happens in the outer query.
        assert!(sql.contains("COUNT(DISTINCT payments_cte.payer_count_raw) AS payer_count"));
        assert!(sql.contains("payer_count AS payer_count_raw"));

        // orders still folds: it has no distinct measure and the tree fans out.
        assert!(sql.contains("SUM(amount) AS revenue_raw"));
        validate_sql(&sql, Dialect::Ansi);
    }

    #[test]
    fn test_avg_refolds_from_parts() {
        let mut graph = two_fact_graph();
        graph
            .add_model(
                Model::new("refunds")
                    .with_table("refunds")
                    .with_primary_key("refund_id")
                    .with_metric(
                        Metric::simple("avg_refund", AggregateFunction::Avg)
                            .with_expr("refund_amount"),
                    )
                    .with_relationship(
                        Relationship::new("customers", Cardinality::ManyToOne)
                            .with_foreign_key("customer_id"),
                    ),
            )
            .unwrap();

        let sql = SqlGenerator::new(&graph)
            .generate(
                &QuerySpec::new()
                    .metric("orders.revenue")
                    .metric("refunds.avg_refund")
                    .dimension("customers.segment"),
            )
            .unwrap();

        // The folded CTE carries sum and count parts; the outer query
        // reweights them instead of averaging averages.
        assert!(sql.contains("SUM(refund_amount) AS avg_refund_sum_raw"));
        assert!(sql.contains("COUNT(refund_amount) AS avg_refund_cnt_raw"));
        assert!(sql.contains(
            "SUM(refunds_cte.avg_refund_sum_raw) / NULLIF(SUM(refunds_cte.avg_refund_cnt_raw), 0)"
        ));
        validate_sql(&sql, Dialect::Ansi);
    }
}
