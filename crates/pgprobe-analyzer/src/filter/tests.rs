//! Tests for filter text analysis

use super::*;

fn ident(name: &str) -> Token {
    Token::Ident {
        qualifier: None,
        name: name.to_string(),
    }
}

mod tokenizer_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_casts_are_dropped() {
        let tokens = tokenize("((status)::text = 'F'::text)").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::LParen,
                Token::LParen,
                ident("status"),
                Token::RParen,
                Token::Operator("=".into()),
                Token::Literal("F".into()),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn test_multi_word_and_modified_casts_are_dropped() {
        let tokens = tokenize(
            "(created_at > '2024-01-01'::timestamp without time zone) AND (price < 9.5::numeric(10,2)) AND (tags = ANY ('{a}'::character varying[]))",
        )
        .unwrap();

        assert!(tokens.iter().all(|t| !matches!(
            t,
            Token::Ident { name, .. } if ["timestamp", "zone", "numeric", "character", "varying"].contains(&name.as_str())
        )));
        assert_eq!(
            tokens.iter().filter(|t| matches!(t, Token::Literal(_))).count(),
            3
        );
    }

    #[test]
    fn test_qualified_and_quoted_identifiers() {
        let tokens = tokenize(r#"(o."Order Id" = c.id)"#).unwrap();
        assert_eq!(
            tokens[1],
            Token::Ident {
                qualifier: Some("o".into()),
                name: "Order Id".into()
            }
        );
        assert_eq!(
            tokens[3],
            Token::Ident {
                qualifier: Some("c".into()),
                name: "id".into()
            }
        );
    }

    #[test]
    fn test_escaped_quotes_inside_literal() {
        let tokens = tokenize("(name = 'O''Brien')").unwrap();
        assert_eq!(tokens[3], Token::Literal("O'Brien".into()));
    }

    #[test]
    fn test_parameters_are_literals() {
        let tokens = tokenize("(id = $1)").unwrap();
        assert_eq!(tokens[3], Token::Literal("$1".into()));
    }

    #[test]
    fn test_unterminated_literal_is_an_error() {
        assert_eq!(
            tokenize("(name = 'abc"),
            Err(FilterParseError::UnterminatedLiteral(8))
        );
    }

    #[test]
    fn test_unterminated_identifier_is_an_error() {
        assert!(matches!(
            tokenize(r#"("name = 1)"#),
            Err(FilterParseError::UnterminatedIdentifier(_))
        ));
    }

    #[test]
    fn test_unterminated_type_modifier_is_an_error() {
        assert_eq!(
            tokenize("(price)::numeric(10"),
            Err(FilterParseError::UnterminatedModifier(16))
        );
        assert_eq!(
            analyze_filter("(price)::numeric(10"),
            Err(FilterParseError::UnterminatedModifier(16))
        );
    }
}

mod filter_shape_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_and_filter() {
        let shape = analyze_filter("(o_custkey = 123) AND (o_orderstatus = 'F')").unwrap();
        assert_eq!(shape.columns, vec!["o_custkey", "o_orderstatus"]);
        assert_eq!(shape.connective, Connective::And);
    }

    #[test]
    fn test_or_filter() {
        let shape = analyze_filter("((email)::text = 'a@b.c'::text) OR (phone IS NULL)").unwrap();
        assert_eq!(shape.columns, vec!["email", "phone"]);
        assert_eq!(shape.connective, Connective::Or);
    }

    #[test]
    fn test_single_predicate() {
        let shape = analyze_filter("(amount > 1000)").unwrap();
        assert_eq!(shape.columns, vec!["amount"]);
        assert_eq!(shape.connective, Connective::Single);
    }

    #[test]
    fn test_like_operators_and_negation() {
        let shape =
            analyze_filter("((name)::text ~~ 'A%'::text) AND (NOT (code ~~* 'x%'))").unwrap();
        assert_eq!(shape.columns, vec!["name", "code"]);
    }

    #[test]
    fn test_keywords_are_not_columns() {
        let shape = analyze_filter("(NULL IS NULL) AND (flag = true)").unwrap();
        assert_eq!(shape.columns, vec!["flag"]);
    }

    #[test]
    fn test_duplicate_columns_collapse() {
        let shape = analyze_filter("(age >= 18) AND (age <= 65)").unwrap();
        assert_eq!(shape.columns, vec!["age"]);
    }

    #[test]
    fn test_qualified_column_uses_bare_name() {
        let shape = analyze_filter("(t.region = ANY ('{eu,us}'::text[]))").unwrap();
        assert_eq!(shape.columns, vec!["region"]);
    }
}

mod suggestion_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn shape(columns: &[&str], connective: Connective) -> FilterShape {
        FilterShape {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            connective,
        }
    }

    #[test]
    fn test_composite_index_for_and() {
        assert_eq!(
            suggest_filter_indexes("orders", &shape(&["o_custkey", "o_orderstatus"], Connective::And)),
            vec!["CREATE INDEX idx_orders_composite ON orders(o_custkey, o_orderstatus);"]
        );
    }

    #[test]
    fn test_one_index_per_column_for_or() {
        assert_eq!(
            suggest_filter_indexes("users", &shape(&["email", "phone"], Connective::Or)),
            vec![
                "CREATE INDEX idx_users_email ON users(email);",
                "CREATE INDEX idx_users_phone ON users(phone);"
            ]
        );
    }

    #[test]
    fn test_single_column_index() {
        assert_eq!(
            suggest_filter_indexes("orders", &shape(&["amount"], Connective::Or)),
            vec!["CREATE INDEX idx_orders_amount ON orders(amount);"]
        );
    }

    #[test]
    fn test_no_columns_no_suggestion() {
        assert!(suggest_filter_indexes("orders", &shape(&[], Connective::And)).is_empty());
    }

    #[test]
    fn test_schema_qualified_table_name() {
        assert_eq!(
            suggest_filter_indexes("sales.orders", &shape(&["id"], Connective::Single)),
            vec!["CREATE INDEX idx_sales_orders_id ON sales.orders(id);"]
        );
    }

    #[test]
    fn test_column_index_keeps_direction() {
        assert_eq!(
            suggest_column_index(
                "orders",
                &["o_orderdate DESC".to_string(), "o_orderkey".to_string()]
            ),
            "CREATE INDEX idx_orders_o_orderdate_o_orderkey ON orders(o_orderdate DESC, o_orderkey);"
        );
    }
}

mod condition_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_columns_for_alias() {
        let columns =
            columns_for_alias("((l.l_orderkey = o.o_orderkey) AND (l.l_suppkey <> o.o_custkey))", "l")
                .unwrap();
        assert_eq!(columns, vec!["l_orderkey", "l_suppkey"]);
    }

    #[test]
    fn test_columns_for_unknown_alias() {
        assert!(columns_for_alias("(a.x = b.y)", "c").unwrap().is_empty());
    }

    #[test]
    fn test_parse_sort_key_plain_and_descending() {
        assert_eq!(
            parse_sort_key("o.o_totalprice DESC").unwrap(),
            Some(SortColumn {
                name: "o_totalprice".into(),
                descending: true
            })
        );
        assert_eq!(
            parse_sort_key("created_at NULLS FIRST").unwrap(),
            Some(SortColumn {
                name: "created_at".into(),
                descending: false
            })
        );
        assert_eq!(
            parse_sort_key("(id)").unwrap().map(|c| c.index_expr()),
            Some("id".to_string())
        );
    }

    #[test]
    fn test_parse_sort_key_rejects_expressions() {
        assert_eq!(parse_sort_key("lower((name)::text)").unwrap(), None);
        assert_eq!(parse_sort_key("(price * quantity)").unwrap(), None);
    }
}
