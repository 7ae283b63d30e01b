use sqlite_records::sql::{
    count_by_key, insert_returning, is_data_change, quote_identifier, quote_literal,
    select_by_key, split_statements, update_by_key,
};
use sqlite_records::{
    ColumnConstraint, ColumnDefinition, DataType, DefaultValue, IndexDefinition, Record,
    TableDefinition, Value,
};

mod split_statements_tests {
    use super::*;

    #[test]
    fn test_splits_on_semicolons() {
        assert_eq!(
            split_statements("SELECT 1; SELECT 2;\nSELECT 3"),
            vec!["SELECT 1", "SELECT 2", "SELECT 3"]
        );
    }

    #[test]
    fn test_drops_empty_fragments() {
        assert!(split_statements("").is_empty());
        assert!(split_statements("  ;; \n ; ").is_empty());
        assert!(split_statements("-- only a comment; really\n/* and; this */").is_empty());
    }

    #[test]
    fn test_quotes_do_not_split() {
        let statements = split_statements(
            "INSERT INTO t VALUES ('a;b', 'it''s;'); SELECT \"c;d\", [e;f], `g;h` FROM t",
        );
        assert_eq!(
            statements,
            vec![
                "INSERT INTO t VALUES ('a;b', 'it''s;')",
                "SELECT \"c;d\", [e;f], `g;h` FROM t",
            ]
        );
    }

    #[test]
    fn test_comments_do_not_split() {
        let statements = split_statements("SELECT 1 -- one; two\n; /* three; */ SELECT 4");
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0], "SELECT 1 -- one; two");
        assert!(statements[1].ends_with("SELECT 4"));
    }

    #[test]
    fn test_trigger_body_is_one_statement() {
        let statements = split_statements(
            "CREATE TEMP TRIGGER t AFTER INSERT ON x BEGIN
                UPDATE x SET a = CASE WHEN new.a > 0 THEN 1 ELSE 0 END;
                DELETE FROM y;
             END;
             SELECT 1",
        );
        assert_eq!(statements.len(), 2);
        assert!(statements[0].starts_with("CREATE TEMP TRIGGER"));
        assert!(statements[0].ends_with("END"));
        assert_eq!(statements[1], "SELECT 1");
    }

    #[test]
    fn test_end_outside_trigger_still_splits() {
        assert_eq!(
            split_statements("BEGIN; INSERT INTO t VALUES (1); END;"),
            vec!["BEGIN", "INSERT INTO t VALUES (1)", "END"]
        );
    }
}

mod builder_tests {
    use super::*;

    fn names(columns: &[&str]) -> Vec<String> {
        columns.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_quoting() {
        assert_eq!(quote_identifier("person"), "\"person\"");
        assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(quote_literal("it's"), "'it''s'");
    }

    #[test]
    fn test_insert_returning() {
        assert_eq!(
            insert_returning("person", &names(&["id", "name", "age"]), &names(&["id"])),
            "INSERT INTO \"person\" (\"id\", \"name\", \"age\") VALUES (?, ?, ?) RETURNING \"id\""
        );
        assert_eq!(
            select_by_key("tag", &names(&["rowid"])),
            "SELECT * FROM \"tag\" WHERE \"rowid\" = ?"
        );
    }

    #[test]
    fn test_data_change_detection() {
        assert!(is_data_change("INSERT INTO t VALUES (1)"));
        assert!(is_data_change("  replace into t values (1)"));
        assert!(is_data_change("-- note\n/* more */ DELETE FROM t"));
        assert!(is_data_change("Update t SET a = 1"));
        assert!(!is_data_change("BEGIN TRANSACTION"));
        assert!(!is_data_change("CREATE TABLE inserts (x)"));
        assert!(!is_data_change("PRAGMA journal_mode = WAL"));
        assert!(!is_data_change("-- INSERT"));
    }

    #[test]
    fn test_key_statements() {
        let keys = names(&["user_id", "group_id"]);
        assert_eq!(
            count_by_key("membership", &keys),
            "SELECT count(*) FROM \"membership\" WHERE \"user_id\" = ? AND \"group_id\" = ?"
        );
        assert_eq!(
            update_by_key("membership", ["role", "since"], &keys),
            "UPDATE \"membership\" SET \"role\" = ?, \"since\" = ? \
             WHERE \"user_id\" = ? AND \"group_id\" = ?"
        );
    }
}

mod definition_tests {
    use super::*;

    #[test]
    fn test_table_ddl() {
        let table = TableDefinition::new("person")
            .with_column(
                ColumnDefinition::new("id", DataType::Integer)
                    .with_constraint(ColumnConstraint::PrimaryKey),
            )
            .with_column(
                ColumnDefinition::new("name", DataType::Text)
                    .with_constraint(ColumnConstraint::NotNull)
                    .with_default(DefaultValue::Text("anon".to_string())),
            )
            .with_column(ColumnDefinition::new("score", DataType::Real).with_default(DefaultValue::Real(0.5)))
            .with_index(IndexDefinition::new("idx_person_name", ["name"]).unique());

        assert_eq!(
            table.create_statements(),
            vec![
                "CREATE TABLE IF NOT EXISTS \"person\" (\"id\" INTEGER PRIMARY KEY, \
                 \"name\" TEXT NOT NULL DEFAULT 'anon', \"score\" REAL DEFAULT (0.5))"
                    .to_string(),
                "CREATE UNIQUE INDEX IF NOT EXISTS \"idx_person_name\" ON \"person\" (\"name\")"
                    .to_string(),
            ]
        );
    }

    #[test]
    fn test_table_level_primary_key() {
        let table = TableDefinition::new("membership")
            .with_column(ColumnDefinition::new("user_id", DataType::Integer))
            .with_column(ColumnDefinition::new("group_id", DataType::Integer))
            .with_column(
                ColumnDefinition::new("joined", DataType::Text)
                    .with_default(DefaultValue::CurrentTimestamp),
            )
            .with_primary_key(["user_id", "group_id"]);

        assert_eq!(
            table.create_statements(),
            vec![
                "CREATE TABLE IF NOT EXISTS \"membership\" (\"user_id\" INTEGER, \
                 \"group_id\" INTEGER, \"joined\" TEXT DEFAULT CURRENT_TIMESTAMP, \
                 PRIMARY KEY (\"user_id\", \"group_id\"))"
                    .to_string()
            ]
        );
    }
}

mod record_tests {
    use super::*;

    #[test]
    fn test_insert_replaces_in_place() {
        let mut record = Record::new().with("id", 1).with("name", "A").with("age", 2);
        assert_eq!(record.insert("name", "B"), Some(Value::from("A")));
        assert_eq!(record.insert("email", None::<&str>), None);

        assert_eq!(record.keys().collect::<Vec<_>>(), vec!["id", "name", "age", "email"]);
        assert_eq!(record.get("name"), Some(&Value::from("B")));
        assert_eq!(record.get("email"), Some(&Value::Null));
        assert_eq!(record.first_value(), Some(&Value::Integer(1)));
        assert_eq!(record.remove("id"), Some(Value::Integer(1)));
        assert!(!record.contains_key("id"));
        assert_eq!(record.len(), 3);
    }

    #[test]
    fn test_from_iterator() {
        let record: Record = [("a", 1), ("b", 2)].into_iter().collect();
        assert_eq!(record, Record::new().with("a", 1).with("b", 2));
    }

    #[test]
    fn test_serializes_as_ordered_map() {
        let record = Record::new()
            .with("id", 1)
            .with("name", "A")
            .with("score", 1.5)
            .with("note", Value::Null);

        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"id":1,"name":"A","score":1.5,"note":null}"#);

        let parsed: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }
}
