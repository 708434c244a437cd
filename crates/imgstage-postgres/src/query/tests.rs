//! Tests for query builder module.

use super::*;
use crate::{StageError, Value};

    #[test]
    fn test_simple_select() {
        let qb = QueryBuilder::new("images").unwrap();
        let (sql, params) = qb.build_select();
        assert_eq!(sql, "SELECT * FROM \"images\"");
        assert!(params.is_empty());
    }

    #[test]
    fn test_select_with_where_and_limit() {
        let qb = QueryBuilder::new("images").unwrap()
            .select(&["image_id", "filepath"]).unwrap()
            .where_eq("filepath", Value::from("a.jpg")).unwrap()
            .limit(1);
        let (sql, params) = qb.build_select();
        assert_eq!(
            sql,
            "SELECT \"image_id\", \"filepath\" FROM \"images\" WHERE \"filepath\" = $1 LIMIT $2"
        );
        assert_eq!(params, vec![Value::from("a.jpg"), Value::BigInt(1)]);
    }

    #[test]
    fn test_insert_binds_values_in_order() {
        let qb = QueryBuilder::new("test_bb_labels").unwrap();
        let values = vec![
            ("class_id".to_string(), Value::Int(1)),
            ("class".to_string(), Value::from("car")),
        ];
        let (sql, params) = qb.build_insert(&values).unwrap();
        assert_eq!(
            sql,
            "INSERT INTO \"test_bb_labels\" (\"class_id\", \"class\") VALUES ($1, $2)"
        );
        assert_eq!(params, vec![Value::Int(1), Value::from("car")]);
    }

    #[test]
    fn test_insert_quotes_stay_in_parameters() {
        let qb = QueryBuilder::new("notes").unwrap();
        let values = vec![("body".to_string(), Value::from("it's '; DROP TABLE x; --"))];
        let (sql, params) = qb.build_insert(&values).unwrap();
        assert_eq!(sql, "INSERT INTO \"notes\" (\"body\") VALUES ($1)");
        assert_eq!(params[0], Value::from("it's '; DROP TABLE x; --"));
    }

    #[test]
    fn test_insert_null_is_literal() {
        let qb = QueryBuilder::new("images").unwrap();
        let values = vec![
            ("x_res".to_string(), Value::Null),
            ("filepath".to_string(), Value::from("a.jpg")),
        ];
        let (sql, params) = qb.build_insert(&values).unwrap();
        assert_eq!(sql, "INSERT INTO \"images\" (\"x_res\", \"filepath\") VALUES (NULL, $1)");
        assert_eq!(params, vec![Value::from("a.jpg")]);
    }

    #[test]
    fn test_insert_returning() {
        let qb = QueryBuilder::new("images").unwrap().returning("image_id").unwrap();
        let values = vec![("filepath".to_string(), Value::from("a.jpg"))];
        let (sql, _) = qb.build_insert(&values).unwrap();
        assert_eq!(
            sql,
            "INSERT INTO \"images\" (\"filepath\") VALUES ($1) RETURNING \"image_id\""
        );
    }

    #[test]
    fn test_insert_casts_catalog_types() {
        let qb = QueryBuilder::new("frames").unwrap()
            .cast("taken", "date").unwrap()
            .cast("tag", "uuid").unwrap();
        let values = vec![
            ("tag".to_string(), Value::from("5f1c7b9e-8a4d-4c1e-9f0a-2b3c4d5e6f70")),
            ("width".to_string(), Value::Int(3)),
            ("taken".to_string(), Value::from("2024-01-02")),
        ];
        let (sql, params) = qb.build_insert(&values).unwrap();
        assert_eq!(
            sql,
            "INSERT INTO \"frames\" (\"tag\", \"width\", \"taken\") \
             VALUES ($1::\"uuid\", $2, $3::\"date\")"
        );
        assert_eq!(params.len(), 3);

        // a NULL keeps its literal even when the column has a cast
        let values = vec![("taken".to_string(), Value::Null)];
        let qb = QueryBuilder::new("frames").unwrap().cast("taken", "date").unwrap();
        let (sql, params) = qb.build_insert(&values).unwrap();
        assert_eq!(sql, "INSERT INTO \"frames\" (\"taken\") VALUES (NULL)");
        assert!(params.is_empty());
    }

    #[test]
    fn test_quote_type_name() {
        assert_eq!(quote_type_name("_int4"), "\"_int4\"");
        assert_eq!(quote_type_name("odd\"name"), "\"odd\"\"name\"");
    }

    #[test]
    fn test_insert_empty_values_rejected() {
        let qb = QueryBuilder::new("images").unwrap();
        assert!(matches!(qb.build_insert(&[]), Err(StageError::Query(_))));
    }

    #[test]
    fn test_insert_invalid_column_rejected() {
        let qb = QueryBuilder::new("images").unwrap();
        let values = vec![("file path".to_string(), Value::from("a.jpg"))];
        assert!(matches!(qb.build_insert(&values), Err(StageError::Validation(_))));
    }

    #[test]
    fn test_select_into_join() {
        let sql = build_select_into_join("a_b_tmp", "a", "b", "image_id").unwrap();
        assert_eq!(
            sql,
            "SELECT * INTO \"a_b_tmp\" FROM \"a\" JOIN \"b\" USING (\"image_id\")"
        );
    }

    #[test]
    fn test_drop_table() {
        assert_eq!(build_drop_table("t", true).unwrap(), "DROP TABLE IF EXISTS \"t\"");
        assert_eq!(build_drop_table("t", false).unwrap(), "DROP TABLE \"t\"");
    }

    #[test]
    fn test_temp_table_name() {
        assert_eq!(
            temp_table_name("test_images", "test_bb_labels"),
            "test_images_test_bb_labels_tmp"
        );
    }

    #[test]
    fn test_identifier_validation() {
        assert!(validate_identifier("test_images").is_ok());
        assert!(validate_identifier("public.test_images").is_ok());
        assert!(validate_identifier("a.b.c").is_err());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("1abc").is_err());
        assert!(validate_identifier("drop").is_err());
        assert!(validate_identifier("pg_class").is_err());
        assert!(validate_identifier("information_schema").is_err());
        assert!(validate_identifier("images; DROP").is_err());
        assert!(validate_identifier(&"x".repeat(64)).is_err());
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("images"), "\"images\"");
        assert_eq!(quote_identifier("public.images"), "\"public\".\"images\"");
    }
