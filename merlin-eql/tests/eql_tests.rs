//! EQL transpiler integration tests

use merlin_eql::{
    ColumnPathTranslator, EqlError, EqlTranspiler, FieldNameError, Stage, Symbol,
    TransformOptions,
};
use merlin_schema::{FieldDataType, FieldDef, SchemaRegistry};
use std::sync::Arc;

fn where_clause(transpiler: &EqlTranspiler, eql: &str) -> String {
    let translation = transpiler
        .transform(eql)
        .unwrap_or_else(|e| panic!("{} failed: {}", eql, e));
    assert!(
        translation.errors.is_empty(),
        "{} produced soft errors: {:?}",
        eql,
        translation.errors
    );
    translation.where_clause
}

fn assert_translations(transpiler: &EqlTranspiler, cases: &[(&str, &str)]) {
    for (eql, expected) in cases {
        assert_eq!(&where_clause(transpiler, eql), expected, "query: {}", eql);
    }
}

#[test]
fn test_conditions_and_categories() {
    assert_translations(
        &EqlTranspiler::default(),
        &[
            ("any where true", "true"),
            ("hostname where true", "(true AND (event.category = 'hostname'))"),
            (
                "hostname where true and false",
                "((true AND false) AND (event.category = 'hostname'))",
            ),
            (
                "hostname where process.pid == 1",
                "((process.pid = 1) AND (event.category = 'hostname'))",
            ),
            ("any where not true", "(NOT true)"),
            ("any where not (foo == 1)", "(NOT ((foo = 1)))"),
            ("any where not (foo == -1)", "(NOT ((foo = -1)))"),
            ("any where not (foo == 1.2)", "(NOT ((foo = 1.2)))"),
            (
                "hostname where process.pid  > 1 + 2",
                "((process.pid > (1 + 2)) AND (event.category = 'hostname'))",
            ),
            (
                "any where process.parent.name == \"bar\" and process.name == \"foo\"",
                "((process.parent.name = 'bar') AND (process.name = 'foo'))",
            ),
            ("any where 1 == 2", "(1 = 2)"),
            ("any where  1  == null", "(1 IS NULL)"),
            ("any where process.name == null", "(process.name IS NULL)"),
            ("any where process.name != null", "(process.name IS NOT NULL)"),
            ("any where process.name != \"x\"", "(process.name <> 'x')"),
            (
                "any where process.pid == ( 4 / process.args_count )",
                "(process.pid = ((4 / process.args_count)))",
            ),
            (
                "any where process.pid == ( 4.1 / process.args_count) ",
                "(process.pid = ((4.1 / process.args_count)))",
            ),
        ],
    );
}

#[test]
fn test_lookups() {
    assert_translations(
        &EqlTranspiler::default(),
        &[
            (
                "any where process.name in (\"naboo\", \"corusant\")",
                "(process.name IN ('naboo', 'corusant'))",
            ),
            (
                "any where process.name not in (\"naboo\", \"corusant\")",
                "(process.name NOT IN ('naboo', 'corusant'))",
            ),
            (
                "any where not process.name : (\"naboo\", \"corusant\")",
                "(NOT ((process.name ILIKE 'naboo') OR (process.name ILIKE 'corusant')))",
            ),
            (
                "any where process.name in~ (\"foo\", \"bar\", \"baz\")",
                "(lower(process.name) IN (lower('foo'), lower('bar'), lower('baz')))",
            ),
            (
                "any where process.name not in~ (\"foo\", \"bar\", \"baz\")",
                "(lower(process.name) NOT IN (lower('foo'), lower('bar'), lower('baz')))",
            ),
            (
                "any where process.name : (\"foo\", \"bar\", \"baz\") ",
                "((process.name ILIKE 'foo') OR ((process.name ILIKE 'bar') OR (process.name ILIKE 'baz')))",
            ),
            (
                "any where process.name like (\"*foo*\", \"bar\", \"baz\") ",
                "((process.name LIKE '%foo%') OR ((process.name LIKE 'bar') OR (process.name LIKE 'baz')))",
            ),
            (
                "any where process.name like~ (\"*foo*\", \"bar\", \"baz\")",
                "((process.name ILIKE '%foo%') OR ((process.name ILIKE 'bar') OR (process.name ILIKE 'baz')))",
            ),
            ("any where process.name like  \"FOO*\"         ", "(process.name LIKE 'FOO%')"),
            ("any where process.name like~ \"foo*\"         ", "(process.name ILIKE 'foo%')"),
            ("any where process.name : \"foo*\"", "(process.name ILIKE 'foo%')"),
            ("any where process.name : \"foo?\"   ", "(process.name ILIKE 'foo_')"),
            ("any where process.name like \"FOO?\" ", "(process.name LIKE 'FOO_')"),
            (
                "any where process.name : (\"f*o\", \"ba?\", \"baz\")",
                "((process.name ILIKE 'f%o') OR ((process.name ILIKE 'ba_') OR (process.name ILIKE 'baz')))",
            ),
            ("any where process.name regex \".*\"", "match(process.name, '.*')"),
            (
                "any where process.name regex  \"FOO[0-9]\"   ",
                "match(process.name, 'FOO[0-9]')",
            ),
            (
                "any where process.name regex~ \"foo[0-9]\" ",
                "match(process.name, 'foo[0-9]')",
            ),
            (
                "any where process.name regex  (\"foo.*\", \"bar[0-9]\", \"baz\")    ",
                "(match(process.name, 'foo.*') OR (match(process.name, 'bar[0-9]') OR match(process.name, 'baz')))",
            ),
            (
                "any where process.name not like \"a*\"",
                "(NOT (process.name LIKE 'a%'))",
            ),
        ],
    );
}

#[test]
fn test_functions() {
    assert_translations(
        &EqlTranspiler::default(),
        &[
            (
                "hostname where process ==  string(1) ",
                "((process = toString(1)) AND (event.category = 'hostname'))",
            ),
            ("any where process.pid == add(process.id, 5)", "(process.pid = (process.id + 5))"),
            (
                "any where cidrMatch(source.address, \"127.0.0.0/16\", \"0.0.0.0/32\")",
                "(isIPAddressInRange(source.address, '127.0.0.0/16') OR isIPAddressInRange(source.address, '0.0.0.0/32'))",
            ),
            (
                "any where process.name == concat(\"foo\", \"bar\")",
                "(process.name = concat('foo', 'bar'))",
            ),
            ("any where process.pid == divide(512, 2)", "(process.pid = (512 / 2))"),
            (
                "any where endsWith(\"quesma.exe\", \".exe\") ",
                "endsWithUTF8('quesma.exe', '.exe')",
            ),
            (
                "any where endsWith~(\"Quesma.exe\", \".EXE\") ",
                "endsWithUTF8(lower('Quesma.exe'), lower('.EXE'))",
            ),
            (
                "any where process.pid == indexOf(url.domain, \".ai\")",
                "(process.pid = position(url.domain, '.ai'))",
            ),
            ("any where process.x == length(\"foo\")", "(process.x = length('foo'))"),
            ("any where process.x == modulo(10, 3)", "(process.x = (10 % 3))"),
            ("any where process.x == multiply(2, 2)", "(process.x = (2 * 2))"),
            ("any where foo == number(\"3.1\") ", "(foo = toFloat('3.1'))"),
            (
                "any where startsWith(\"quesma.exe\", \"qu\")",
                "startsWithUTF8('quesma.exe', 'qu')",
            ),
            (
                "any where startsWith~(\"Quesma.exe\", \"qu\")     ",
                "startsWithUTF8(lower('Quesma.exe'), lower('qu'))",
            ),
            ("any where foo == string(2024)", "(foo = toString(2024))"),
            ("any where foo == string(true)", "(foo = toString(true))"),
            (
                "any where stringContains(process.command_line, \"quesma\")",
                "hasSubsequence(process.command_line, 'quesma')",
            ),
            (
                "any where stringContains~(process.command_line, \"Quesma\")",
                "hasSubsequence(lower(process.command_line), lower('Quesma'))",
            ),
            (
                "any where process.name == substring(\"start quesma.exe\", 6)",
                "(process.name = substring('start quesma.exe', 6))",
            ),
            ("any where foo == subtract(10, 2)", "(foo = (10 - 2))"),
            ("any where add(1,2) == 2", "((1 + 2) = 2)"),
            ("any where add(1,null) == 1", "((1 + NULL) = 1)"),
            ("any where STARTSWITH(a, \"b\")", "startsWithUTF8(a, 'b')"),
        ],
    );
}

#[test]
fn test_string_escaping() {
    assert_translations(
        &EqlTranspiler::default(),
        &[
            ("any where foo == \"\\n\"", "(foo = '\\n')"),
            (
                "any where foo == \"'; delete from table\"",
                "(foo = '\\'; delete from table')",
            ),
            (
                "any where foo == \"\"\"C:\\Windows\"\"\"",
                "(foo = 'C:\\\\Windows')",
            ),
        ],
    );
}

#[test]
fn test_column_path_translator() {
    let transpiler = EqlTranspiler::new(
        TransformOptions::default().with_field_name_translator(ColumnPathTranslator),
    );
    assert_translations(
        &transpiler,
        &[
            ("any where true", "true"),
            (
                "hostname where true",
                "(true AND (\"event::category\" = 'hostname'))",
            ),
            (
                "hostname where process.pid == 1",
                "((\"process::pid\" = 1) AND (\"event::category\" = 'hostname'))",
            ),
            ("any where not (foo == 1)", "(NOT ((\"foo\" = 1)))"),
        ],
    );
}

#[test]
fn test_closure_translator() {
    let transpiler = EqlTranspiler::new(TransformOptions::default().with_field_name_translator(
        |field: &Symbol| -> Result<Symbol, FieldNameError> {
            Ok(Symbol::new(field.as_str().replace('.', "::")))
        },
    ));
    assert_eq!(
        where_clause(&transpiler, "hostname where process.pid == 1"),
        "((process::pid = 1) AND (event::category = 'hostname'))"
    );
}

#[test]
fn test_schema_translator() {
    let schema = SchemaRegistry::from_definitions(vec![
        FieldDef {
            path: "process.name".to_string(),
            column: "process_name".to_string(),
            data_type: FieldDataType::String,
            description: None,
        },
        FieldDef {
            path: "event.category".to_string(),
            column: "category".to_string(),
            data_type: FieldDataType::String,
            description: None,
        },
    ])
    .unwrap();
    schema.register_alias("name", "process.name").unwrap();

    let transpiler = EqlTranspiler::new(
        TransformOptions::default().with_shared_translator(Arc::new(schema)),
    );

    assert_eq!(
        where_clause(&transpiler, "process where name : \"cmd*\""),
        "((process_name ILIKE 'cmd%') AND (category = 'process'))"
    );

    let translation = transpiler.transform("process where user.id == 1").unwrap();
    assert_eq!(translation.errors, vec!["unknown field 'user.id'".to_string()]);
    assert_eq!(
        translation.where_clause,
        "((throwIf(true, 'unknown field \\'user.id\\'') = 1) AND (category = 'process'))"
    );
}

#[test]
fn test_fatal_errors() {
    let transpiler = EqlTranspiler::default();
    let cases = [
        ("any where ?notexisting == true ", "optional fields are not supported", Stage::Lower),
        ("any where true | head 1", "unsupported query type", Stage::Gate),
        ("any where == 1", "Syntax error", Stage::Parse),
    ];

    for (eql, pattern, stage) in cases {
        let err = transpiler.transform(eql).unwrap_err();
        assert!(
            err.to_string().contains(pattern),
            "{}: expected '{}', got '{}'",
            eql,
            pattern,
            err
        );
        assert_eq!(err.stage(), stage, "{}", eql);
    }
}

#[test]
fn test_between_is_soft_error() {
    let translation = EqlTranspiler::default()
        .transform("any where between(file.path, \"System32\\\\\", \".exe\")  == \"\"")
        .unwrap();
    assert_eq!(
        translation.where_clause,
        "(throwIf(true, 'between function is not implemented') = '')"
    );

    let err = translation.into_strict().unwrap_err();
    assert!(err.to_string().contains("between function is not implemented"));
}

#[test]
fn test_arity_errors_degrade_gracefully() {
    let translation = EqlTranspiler::default()
        .transform("any where length(a, b) == 1")
        .unwrap();
    assert!(!translation.where_clause.is_empty());
    assert_eq!(translation.errors.len(), 1);
    assert!(translation.errors[0].contains("length"));
}

#[test]
fn test_unknown_function_is_syntax_error() {
    // the grammar only knows the supported function names
    let err = EqlTranspiler::default()
        .transform("any where wildcard(a, \"b\")")
        .unwrap_err();
    assert!(matches!(err, EqlError::Syntax(_)));
}

#[test]
fn test_unsupported_shapes() {
    let transpiler = EqlTranspiler::default();
    for eql in [
        "process where true | head 3",
        "sequence [ a where true ] [ b where true ]",
        "sample by f [ a where true ]",
    ] {
        assert!(matches!(
            transpiler.transform(eql),
            Err(EqlError::UnsupportedQuery { .. })
        ));
    }
    assert!(transpiler.transform("process where true").is_ok());
}

#[test]
fn test_category_fusion_with_custom_field() {
    let transpiler =
        EqlTranspiler::new(TransformOptions::default().with_category_field("category.name"));
    assert_eq!(
        where_clause(&transpiler, "hostname where process.name == \"init\""),
        "((process.name = 'init') AND (category.name = 'hostname'))"
    );
}

#[test]
fn test_wildcard_escaping_order() {
    let transpiler = EqlTranspiler::default();

    // literal % and _ are escaped before * becomes a wildcard
    let exp = transpiler
        .transform("any where field like \"100%_off*\"")
        .unwrap();
    assert_eq!(exp.where_clause, "(field LIKE '100\\\\%\\\\_off%')");

    let with_params = EqlTranspiler::new(TransformOptions::default().with_extract_parameters(true))
        .transform("any where field like \"100%_off*\"")
        .unwrap();
    assert_eq!(with_params.where_clause, "(field LIKE {P_1:String})");
    assert_eq!(
        with_params.parameters.get("P_1"),
        Some(&merlin_eql::Const::String("100\\%\\_off%".to_string()))
    );
}

#[test]
fn test_logical_case_normalization() {
    let transpiler = EqlTranspiler::default();
    assert_eq!(
        where_clause(&transpiler, "any where a == 1 and b == 2"),
        "((a = 1) AND (b = 2))"
    );
    assert_eq!(
        where_clause(&transpiler, "any where a == 1 OR b == 2"),
        "((a = 1) OR (b = 2))"
    );
}

#[test]
fn test_deterministic_output() {
    let transpiler = EqlTranspiler::new(
        TransformOptions::default()
            .with_field_name_translator(ColumnPathTranslator)
            .with_extract_parameters(true),
    );
    let eql = "process where process.name : (\"a*\", \"b?\") and process.pid > 10";
    let first = transpiler.transform(eql).unwrap();
    let second = transpiler.transform(eql).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_translation_json_shape() {
    let transpiler =
        EqlTranspiler::new(TransformOptions::default().with_extract_parameters(true));
    let translation = transpiler
        .transform("any where a == 1 and b : \"x*\"")
        .unwrap();

    assert_eq!(
        serde_json::to_value(&translation).unwrap(),
        serde_json::json!({
            "where_clause": "((a = {P_1:Int64}) AND (b ILIKE {P_2:String}))",
            "parameters": { "P_1": 1, "P_2": "x%" },
            "errors": [],
        })
    );
}

#[tokio::test]
async fn test_concurrent_transforms() {
    let transpiler = Arc::new(EqlTranspiler::new(
        TransformOptions::default().with_field_name_translator(ColumnPathTranslator),
    ));

    let mut handles = Vec::new();
    for i in 0..32 {
        let transpiler = transpiler.clone();
        handles.push(tokio::spawn(async move {
            let eql = format!("process where process.pid == {}", i);
            (i, transpiler.transform(&eql).unwrap().where_clause)
        }));
    }

    for handle in handles {
        let (i, where_clause) = handle.await.unwrap();
        assert_eq!(
            where_clause,
            format!(
                "((\"process::pid\" = {}) AND (\"event::category\" = 'process'))",
                i
            )
        );
    }
}
