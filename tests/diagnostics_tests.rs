/// Recoverable diagnostics, fatal errors and how the pipeline reports them
use pl241_ssa::{CompileOptions, Compiler, Error, ErrorSeverity};

fn lenient() -> Compiler {
    Compiler::new(CompileOptions {
        allow_recovered_errors: true,
        ..CompileOptions::default()
    })
}

fn messages(source: &str) -> Vec<String> {
    let output = pl241_ssa::parse(source).unwrap();
    output
        .diagnostics
        .iter()
        .map(|d| d.message.clone())
        .collect()
}

#[test]
fn test_warnings_do_not_reject() {
    let source = "main\nvar x, x;\nprocedure p;\n{\n    return 1;\n    call OutputNewLine\n};\n{\n    call q(x)\n}.";

    let result = pl241_ssa::compile(source).unwrap();
    let lines: Vec<_> = result.diagnostics.iter().map(|d| d.line).collect();

    assert_eq!(lines, vec![2, 5, 6, 9]);
    assert!(result
        .diagnostics
        .iter()
        .all(|d| d.severity == ErrorSeverity::Warning));
    assert!(result.diagnostics[0].message.contains("already declared"));
    assert!(result.diagnostics[1].message.contains("return value ignored"));
    assert!(result.diagnostics[2].message.contains("unreachable"));
    assert!(result.diagnostics[3].message.contains("undeclared method `q`"));
}

#[test]
fn test_unscannable_character_rejects_program() {
    let source = "main var x; { let x <- 1 @; call OutputNum(x) } .";

    let error = pl241_ssa::compile(source).unwrap_err();
    let Error::InvalidProgram {
        error_count,
        diagnostics,
    } = &error
    else {
        panic!("expected InvalidProgram, got {:?}", error);
    };
    assert_eq!(*error_count, 1);
    assert!(diagnostics[0].message.contains("unexpected character"));
    assert_eq!(error.classify(), ErrorSeverity::Recoverable);
    assert_eq!(error.to_string(), "Program rejected with 1 error(s)");

    let result = lenient().compile(source).unwrap();
    assert_eq!(result.diagnostics.len(), 1);
    assert!(result.diagnostics[0].is_error());
}

#[test]
fn test_semantic_errors_are_recoverable() {
    assert!(messages("main { call OutputNum(1, 2) } .")[0].contains("expects 1 argument(s), 2 given"));
    assert!(messages("main array[2][2] a; { let a[1] <- 3 } .")[0]
        .contains("2 dimension(s), 1 index(es) given"));
    assert!(messages("main array[0] a; { } .")[0].contains("must be positive"));
    assert!(messages("main var x; { let x[1] <- 2 } .")[0].contains("is not an array"));
    assert!(messages("main var x { let x <- 2 } .")[0].contains("expected `;`"));
}

#[test]
fn test_method_name_clashes() {
    let clash = messages("main procedure p; { }; procedure p; { }; { call p } .");
    assert_eq!(clash.len(), 1);
    assert!(clash[0].contains("method `p` is already declared"));

    let builtin = messages("main function InputNum; { return 1 }; { } .");
    assert!(builtin[0].contains("is a built-in"));
}

#[test]
fn test_fatal_error_carries_earlier_diagnostics() {
    let error = pl241_ssa::compile("main var x, x; { let y <- 1 } .").unwrap_err();

    assert!(matches!(error, Error::Aborted { .. }));
    assert_eq!(
        error.root(),
        &Error::UndefinedVariable {
            name: "y".to_string(),
            line: 1
        }
    );
    assert_eq!(error.classify(), ErrorSeverity::Fatal);
    assert_eq!(error.line(), Some(1));
    assert_eq!(error.diagnostics().len(), 1);
}

#[test]
fn test_value_of_procedure_call_is_fatal() {
    let error = pl241_ssa::compile("main var x; procedure p; { }; { let x <- call p } .").unwrap_err();
    assert_eq!(
        error.root(),
        &Error::VoidValue {
            callee: "p".to_string(),
            line: 1
        }
    );
}

#[test]
fn test_oversized_literal_is_fatal() {
    let error = pl241_ssa::compile("main var x; { let x <- 99999999999999999999 } .").unwrap_err();
    assert!(matches!(error.root(), Error::SyntaxError { line: 1, .. }));
}

#[test]
fn test_diagnostics_display_and_serialize() {
    let output = pl241_ssa::parse("main\nvar x, x;\n{ } .").unwrap();
    let diagnostic = &output.diagnostics[0];

    assert!(diagnostic
        .to_string()
        .starts_with("warning at line 2, column"));

    let json = serde_json::to_string(&output.diagnostics).unwrap();
    assert!(json.contains("\"severity\":\"Warning\""));
    assert!(json.contains("\"line\":2"));
}
