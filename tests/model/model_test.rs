#[cfg(test)]
mod tests {
    use strata::{
        AggregateFunction, ComparisonKind, Dimension, DimensionKind, Metric, MetricKind, Model,
        PreAggregation, TimeGranularity,
    };

    #[test]
    fn test_model_from_json() {
        let json = r#"{
            "name": "orders",
            "table": "analytics.orders",
            "primary_key": ["order_id"],
            "dimensions": [
                {"name": "region", "kind": "categorical"},
                {"name": "created_at", "kind": "time", "granularity": "day"}
            ],
            "metrics": [
                {"name": "revenue", "kind": "simple", "agg": "sum", "expr": "amount"},
                {"name": "order_count", "kind": "simple", "agg": "count"},
                {
                    "name": "aov",
                    "kind": "ratio",
                    "numerator": "orders.revenue",
                    "denominator": "orders.order_count"
                }
            ],
            "relationships": [
                {"name": "customers", "cardinality": "many_to_one", "foreign_key": "customer_id"}
            ]
        }"#;

        let model: Model = serde_json::from_str(json).unwrap();
        assert_eq!(model.name, "orders");
        assert_eq!(model.table.as_deref(), Some("analytics.orders"));
        assert_eq!(model.dimensions.len(), 2);
        assert_eq!(model.metrics.len(), 3);
        assert!(model.validate().is_ok());

        let created_at = model.dimension("created_at").unwrap();
        assert!(created_at.is_time());
        assert_eq!(created_at.granularity, Some(TimeGranularity::Day));

        let aov = model.metric("aov").unwrap();
        assert!(matches!(aov.kind, MetricKind::Ratio { .. }));
    }

    #[test]
    fn test_metric_kind_tags() {
        let json = r#"{
            "name": "revenue_yoy",
            "kind": "time_comparison",
            "base": "orders.revenue",
            "comparison": "yoy"
        }"#;
        let metric: Metric = serde_json::from_str(json).unwrap();
        assert_eq!(
            metric.kind,
            MetricKind::TimeComparison {
                base: "orders.revenue".to_string(),
                comparison: ComparisonKind::Yoy,
            }
        );

        let json = r#"{
            "name": "running_revenue",
            "kind": "cumulative",
            "measure": "orders.revenue",
            "window": 7
        }"#;
        let metric: Metric = serde_json::from_str(json).unwrap();
        assert!(metric.is_windowed());

        let json = r#"{
            "name": "signup_rate",
            "kind": "conversion",
            "entity": "user_id",
            "base_event": "visit",
            "conversion_event": "signup",
            "window": "14 days"
        }"#;
        let metric: Metric = serde_json::from_str(json).unwrap();
        assert_eq!(
            metric.kind,
            MetricKind::Conversion {
                entity: "user_id".to_string(),
                base_event: "visit".to_string(),
                conversion_event: "signup".to_string(),
                window: Some("14 days".to_string()),
            }
        );
        assert!(!metric.is_windowed());
    }

    #[test]
    fn test_fill_nulls_with_round_trips() {
        let metric = Metric {
            fill_nulls_with: Some(serde_json::json!(0)),
            ..Metric::simple("revenue", AggregateFunction::Sum)
        };
        let json = serde_json::to_string(&metric).unwrap();
        let back: Metric = serde_json::from_str(&json).unwrap();
        assert_eq!(back.fill_nulls_with, Some(serde_json::json!(0)));
    }

    #[test]
    fn test_granularity_ordering() {
        assert!(TimeGranularity::Day < TimeGranularity::Month);
        assert!(TimeGranularity::Month < TimeGranularity::Year);
        assert_eq!(TimeGranularity::parse("quarter"), Some(TimeGranularity::Quarter));
        assert_eq!(TimeGranularity::parse("fortnight"), None);
    }

    #[test]
    fn test_validate_rejects_table_and_sql() {
        let model = Model::new("orders")
            .with_table("orders")
            .with_sql("SELECT * FROM raw_orders");
        assert!(model.validate().is_err());

        let model = Model::new("orders");
        assert!(model.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_fields() {
        let model = Model::new("orders")
            .with_table("orders")
            .with_dimension(Dimension::new("region", DimensionKind::Categorical))
            .with_metric(Metric::simple("region", AggregateFunction::Count));
        assert!(model.validate().is_err());
    }

    #[test]
    fn test_preagg_serde() {
        let json = r#"{
            "name": "daily_rollup",
            "measures": ["revenue", "order_count"],
            "dimensions": ["region"],
            "time_dimension": "created_at",
            "granularity": "day"
        }"#;
        let preagg: PreAggregation = serde_json::from_str(json).unwrap();
        assert_eq!(preagg.table_name("orders"), "orders_preagg_daily_rollup");
        assert_eq!(preagg.time_column().as_deref(), Some("created_at__day"));
    }

    #[test]
    fn test_key_column_defaults_to_id() {
        assert_eq!(Model::new("orders").key_column(), "id");
        assert_eq!(
            Model::new("orders").with_primary_key("order_id").key_column(),
            "order_id"
        );
    }
}
