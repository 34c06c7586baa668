use crate::client::{parse_param, ProtocolError};

#[test]
fn test_parse_param_full() {
  assert_eq!(
    parse_param("prob42;stud7").unwrap(),
    ("prob42".to_string(), Some("stud7".to_string()))
  );
}

#[test]
fn test_parse_param_without_student() {
  assert_eq!(parse_param("prob42").unwrap(), ("prob42".to_string(), None));
  assert_eq!(parse_param("prob42;").unwrap(), ("prob42".to_string(), None));
  assert_eq!(
    parse_param(" prob42 ; ").unwrap(),
    ("prob42".to_string(), None)
  );
}

#[test]
fn test_parse_param_keeps_extra_separators_in_student() {
  // Only the first separator splits; the UI owns the rest.
  assert_eq!(
    parse_param("p;s;x").unwrap(),
    ("p".to_string(), Some("s;x".to_string()))
  );
}

#[test]
fn test_parse_param_requires_problem_id() {
  assert!(matches!(
    parse_param(""),
    Err(ProtocolError::BadHeader { .. })
  ));
  assert!(matches!(
    parse_param(";stud7"),
    Err(ProtocolError::BadHeader { .. })
  ));
}
