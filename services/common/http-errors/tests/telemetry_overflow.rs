use common_http_errors::test_helpers::{simulate_error_code, distinct_gauge, overflow_count};
use common_http_errors::MAX_ERROR_CODES;

#[test]
fn distinct_and_overflow_tracking() {
    for i in 0..5 {
        simulate_error_code(&format!("code_{}", i));
    }
    assert_eq!(distinct_gauge(), 5);
    let before_overflow = overflow_count();

    // Repeating a seen code never overflows.
    simulate_error_code("code_0");
    assert_eq!(overflow_count(), before_overflow);

    for i in 5..50 {
        simulate_error_code(&format!("code_{}", i));
    }
    assert_eq!(distinct_gauge() as usize, MAX_ERROR_CODES);
    assert_eq!(overflow_count() - before_overflow, 10);

    // Codes admitted before the cap keep their own label.
    simulate_error_code("code_3");
    assert_eq!(overflow_count() - before_overflow, 10);
}
