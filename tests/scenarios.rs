//! Black-box scenarios driving a fresh `Runtime` through `eval_str`,
//! exercising the value model, named store, and error/interrupt paths
//! together rather than through any one module in isolation.

use codswallop::value::Value;
use codswallop::Runtime;

fn top(rt: &Runtime) -> &Value {
    rt.stack.last().expect("expected a value on the stack")
}

#[test]
fn integer_arithmetic_round_trips_through_the_dispatch_table() {
    let mut rt = Runtime::new();
    rt.eval_str("#3 #4 I*.+int").unwrap();
    assert!(matches!(top(&rt), Value::Integer(7)));
}

#[test]
fn division_by_zero_is_a_handled_error_not_a_panic() {
    let mut rt = Runtime::new();
    rt.eval_str("#1 #0 I*./int").unwrap();
    assert!(rt.reason.contains("Division by zero"));
}

#[test]
fn stack_shuffling_words_compose() {
    let mut rt = Runtime::new();
    rt.eval_str("#1 #2 I*.swap").unwrap();
    assert_eq!(rt.stack.len(), 2);
    assert!(matches!(rt.stack[0], Value::Integer(2)));
    assert!(matches!(rt.stack[1], Value::Integer(1)));
}

#[test]
fn dup_leaves_two_copies_on_the_stack() {
    let mut rt = Runtime::new();
    rt.eval_str("#9 I*.dup").unwrap();
    assert_eq!(rt.stack.len(), 2);
    assert!(rt.stack[0].structural_eq(&rt.stack[1]));
}

#[test]
fn storing_under_a_quoted_name_and_referencing_it_bare_recalls_the_value() {
    let mut rt = Runtime::new();
    rt.eval_str("#42 'x I*.sto x").unwrap();
    assert!(matches!(top(&rt), Value::Integer(42)));
}

#[test]
fn erase_makes_a_stored_name_unrecallable() {
    let mut rt = Runtime::new();
    rt.eval_str("#1 'y I*.sto 'y I*.rm 'y I*.exists").unwrap();
    assert!(matches!(top(&rt), Value::Integer(0)));
}

#[test]
fn ifte_picks_the_then_branch_on_a_nonzero_condition() {
    let mut rt = Runtime::new();
    rt.eval_str("#1 #10 #20 I*.ifte").unwrap();
    assert!(matches!(top(&rt), Value::Integer(10)));
}

#[test]
fn ifte_picks_the_else_branch_on_a_zero_condition() {
    let mut rt = Runtime::new();
    rt.eval_str("#0 #10 #20 I*.ifte").unwrap();
    assert!(matches!(top(&rt), Value::Integer(20)));
}

#[test]
fn comparison_words_normalize_to_a_op_b() {
    let mut rt = Runtime::new();
    rt.eval_str("#3 #5 I*.<").unwrap();
    assert!(matches!(top(&rt), Value::Integer(1)));
}

#[test]
fn a_comment_is_a_silent_no_op() {
    let mut rt = Runtime::new();
    rt.eval_str("#1 (this changes nothing) #2").unwrap();
    assert_eq!(rt.stack.len(), 2);
}

#[test]
fn referencing_an_unbound_symbol_sets_an_error_reason_and_halts() {
    let mut rt = Runtime::new();
    rt.eval_str("thisNameDoesNotExist").unwrap();
    assert!(!rt.running);
    assert!(rt.reason.contains("cannot always find"));
}

#[test]
fn a_list_literal_is_pushed_as_a_single_inert_value() {
    let mut rt = Runtime::new();
    rt.eval_str("{ #1 #2 #3 }").unwrap();
    assert_eq!(rt.stack.len(), 1);
    match top(&rt) {
        Value::List(items) => assert_eq!(items.borrow().len(), 3),
        other => panic!("expected a List, got {other:?}"),
    }
}

#[test]
fn break_requested_is_observed_before_the_next_context_step() {
    let mut rt = Runtime::new();
    rt.request_break();
    rt.eval_str("#1 #2 #3").unwrap();
    assert!(rt.interrupt);
}

#[test]
fn type_introspection_reports_the_runtime_type_name() {
    let mut rt = Runtime::new();
    rt.eval_str("#1 I*.type").unwrap();
    assert!(matches!(top(&rt), Value::Str(s) if &**s == "Integer"));
}

#[test]
fn a_float_literal_needs_no_prefix_and_an_integer_literal_needs_hash() {
    let mut rt = Runtime::new();
    rt.eval_str("3 #4").unwrap();
    assert_eq!(rt.stack.len(), 2);
    assert!(matches!(rt.stack[0], Value::Float(x) if x == 3.0));
    assert!(matches!(rt.stack[1], Value::Integer(4)));
}

#[test]
fn a_float_literal_can_lead_with_a_dot_or_a_sign() {
    let mut rt = Runtime::new();
    rt.eval_str(".5 -2.25 +1e2").unwrap();
    assert_eq!(rt.stack.len(), 3);
    assert!(matches!(rt.stack[0], Value::Float(x) if x == 0.5));
    assert!(matches!(rt.stack[1], Value::Float(x) if x == -2.25));
    assert!(matches!(rt.stack[2], Value::Float(x) if x == 100.0));
}

#[test]
fn alternate_mode_splices_a_recalled_symbols_value_without_executing_it_early() {
    let mut rt = Runtime::new();
    rt.eval_str("'::I*.dup I*.+int; 'bumpit I*.sto #5 `bumpit")
        .unwrap();
    assert_eq!(rt.stack.len(), 1);
    assert!(matches!(top(&rt), Value::Integer(10)));
}

#[test]
fn alternate_mode_silently_drops_a_comment_with_no_placeholder_value() {
    let mut rt = Runtime::new();
    rt.eval_str("#1 `(dropped) #2").unwrap();
    assert_eq!(rt.stack.len(), 2);
    assert!(matches!(rt.stack[0], Value::Integer(1)));
    assert!(matches!(rt.stack[1], Value::Integer(2)));
}

#[test]
fn nested_parentheses_in_a_comment_balance_before_resuming() {
    let mut rt = Runtime::new();
    rt.eval_str("(nested (x) fine) #9").unwrap();
    assert_eq!(rt.stack.len(), 1);
    assert!(matches!(top(&rt), Value::Integer(9)));
}

#[test]
fn a_stored_code_value_runs_when_referenced_bare_and_stays_inert_via_rcl() {
    let mut rt = Runtime::new();
    rt.eval_str("'::#1; 'foo I*.sto foo").unwrap();
    assert_eq!(rt.stack.len(), 1);
    assert!(matches!(top(&rt), Value::Integer(1)));

    rt.eval_str("'foo I*.rcl").unwrap();
    match top(&rt) {
        Value::Code(items) => assert_eq!(items.borrow().len(), 2),
        other => panic!("expected a Code value from rcl, got {other:?}"),
    }
}

#[test]
fn list_indexing_with_get_is_zero_based() {
    let mut rt = Runtime::new();
    rt.eval_str("{ #10 #20 #30 } #1 I*.get").unwrap();
    assert!(matches!(top(&rt), Value::Integer(20)));
}

#[test]
fn regtype_wires_a_user_type_evaluator_onto_matching_tags() {
    let mut rt = Runtime::new();
    rt.eval_str("'::I*.dup; 'Boxed I*.regtype").unwrap();
    rt.eval_str(":Boxed:99").unwrap();
    assert_eq!(rt.stack.len(), 3);
    for v in &rt.stack[1..] {
        match v {
            Value::Tag(t) => {
                let t = t.borrow();
                assert_eq!(t.name, "Boxed");
                assert!(matches!(t.obj, Value::Integer(99)));
            }
            other => panic!("expected a Tag, got {other:?}"),
        }
    }
}

#[test]
fn a_custom_except_handler_can_recover_and_resume_execution_after_the_failure_point() {
    let mut rt = Runtime::new();
    rt.eval_str("'::#999; 'EXCEPT I*.sto #1 #0 I*./int #111")
        .unwrap();
    assert_eq!(rt.stack.len(), 2);
    assert!(matches!(rt.stack[0], Value::Integer(999)));
    assert!(matches!(rt.stack[1], Value::Integer(111)));
}

#[test]
fn recursion_past_call_depth_is_a_handled_error_not_a_stack_overflow() {
    let mut rt = Runtime::new();
    rt.eval_str("'::spin I*.dup; 'spin I*.sto spin").unwrap();
    assert!(!rt.running);
    assert!(rt.reason.contains("2048 recursions"));
}

#[test]
fn tail_recursive_countdown_does_not_grow_the_call_depth() {
    let mut rt = Runtime::new();
    let src = "'::I*.dup #0 I*.== '::I*.drop; '::#1 I*.-int count; I*.ifte; \
               'count I*.sto #5000 count";
    rt.eval_str(src).unwrap();
    assert!(rt.reason.is_empty());
    assert!(rt.stack.is_empty());
}
